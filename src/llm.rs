use serde::{Deserialize, Serialize};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::{Config, SummaryConfig};
use crate::extractor::collapse_whitespace;

const ELLIPSIS: &str = "...";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("No text provided to summarize.")]
    EmptyInput,

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Gemini API returned an unreadable response")]
    MalformedResponse(#[source] serde_json::Error),

    #[error("Gemini API response contained no candidate text")]
    NoCandidate,

    #[error("request to Gemini API failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize, Deserialize, Debug)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    top_k: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.5,
    max_output_tokens: 200,
    top_p: 0.8,
    top_k: 40,
};

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    api_base: String,
    model: String,
    api_key: String,
    summary: SummaryConfig,
}

impl GeminiClient {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            api_base: config.gemini_api_base.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
            summary: config.summary.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    /// Asks the model for a one-sentence summary of `text`.
    ///
    /// A single attempt is made; any upstream failure is returned as is.
    pub async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        if text.trim().is_empty() {
            return Err(SummarizeError::EmptyInput);
        }

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part { text: Some(build_prompt(text, &self.summary)) }],
            }],
            generation_config: GENERATION_CONFIG,
        };

        let res = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %detail, "Gemini API error");
            return Err(SummarizeError::Upstream {
                status: status.as_u16(),
                message: format!("Gemini API error: {}", status_line(status)),
            });
        }

        let raw = res.text().await?;
        let parsed: GenerateContentResponse =
            serde_json::from_str(&raw).map_err(SummarizeError::MalformedResponse)?;

        let summary = first_candidate_text(parsed).ok_or(SummarizeError::NoCandidate)?;
        let summary = normalize_summary(&summary);
        if summary.is_empty() {
            return Err(SummarizeError::NoCandidate);
        }

        debug!(chars = summary.chars().count(), "received summary");
        Ok(truncate_summary(&summary, self.summary.max_chars))
    }
}

/// Joins the text parts of the first candidate, in order.
fn first_candidate_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    if content.parts.is_empty() {
        return None;
    }
    Some(content.parts.into_iter().filter_map(|p| p.text).collect())
}

pub(crate) fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

pub fn build_prompt(content: &str, summary: &SummaryConfig) -> String {
    let mut result = String::with_capacity(content.len() + 600);
    result.push_str("You are a professional editor who reads the content of a web page and condenses its core into a single sentence.\n\n");
    result.push_str("# Constraints\n");
    result.push_str(&format!("- Write exactly one sentence, in {}.\n", summary.language));
    result.push_str("- The sentence must reflect the most important conclusion or subject of the page.\n");
    result.push_str("- Avoid technical jargon; prefer plain, widely understood words.\n");
    result.push_str(&format!("- Keep it concise, at most {} characters.\n", summary.max_chars));
    result.push_str("- Stay with the objective facts of the source; add no opinions or interpretation.\n\n");
    result.push_str("# Input\n");
    result.push_str("The following text was extracted from the web page to summarize.\n\n");
    result.push_str(content);
    result.push_str("\n\n# Output\n");
    result
}

/// Folds the model output onto one line.
pub fn normalize_summary(raw: &str) -> String {
    collapse_whitespace(raw)
}

/// Caps `summary` at `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_summary(summary: &str, max_chars: usize) -> String {
    if summary.chars().count() <= max_chars {
        return summary.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut result: String = summary.chars().take(keep).collect();
    result.push_str(ELLIPSIS);
    result
}
