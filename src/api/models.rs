use serde::{Deserialize, Serialize};

/// Body of `POST /api/summarize`. A missing `text` is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Debug, Deserialize)]
pub struct FetchUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
    /// Also run the content extractor on the fetched page.
    #[serde(default)]
    pub extract: bool,
}

#[derive(Debug, Serialize)]
pub struct FetchUrlResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}
