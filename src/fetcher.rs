use std::time::Duration;
use axum::http::StatusCode;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, ClientBuilder, Url};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::llm::status_line;

const USER_AGENT: &str = concat!("web-summarizer/", env!("CARGO_PKG_VERSION"));

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://.+").expect("Failed to compile URL pattern")
});

/// Builds the client shared by every outbound call.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Checks a caller-supplied URL before anything is fetched.
pub fn validate_url(raw: &str, allowed_hosts: &[String]) -> Result<Url> {
    let invalid = || AppError::Validation("A valid http(s) URL is required.".to_string());

    if !URL_PATTERN.is_match(raw) {
        return Err(invalid());
    }
    let url = Url::parse(raw).map_err(|_| invalid())?;
    let host = url.host_str().ok_or_else(invalid)?.to_ascii_lowercase();

    if !allowed_hosts.is_empty() && !allowed_hosts.iter().any(|h| *h == host) {
        warn!(%host, "fetch refused for host outside allow-list");
        return Err(AppError::Validation(format!("Fetching from {} is not allowed.", host)));
    }

    Ok(url)
}

/// GETs `url` and returns the body unprocessed.
pub async fn fetch_html(client: &Client, url: Url) -> Result<String> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        debug!(status = status.as_u16(), "fetch returned non-success status");
        return Err(AppError::Upstream {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            message: format!("Failed to fetch URL: {}", status_line(status)),
        });
    }

    let html = response.text().await?;
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_urls() {
        assert!(validate_url("https://example.com/article", &[]).is_ok());
        assert!(validate_url("http://example.com", &[]).is_ok());
    }

    #[test]
    fn rejects_urls_outside_the_pattern() {
        for raw in ["", "example.com", "ftp://example.com", "https://", "javascript:alert(1)", " https://example.com"] {
            let err = validate_url(raw, &[]).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn rejects_unparseable_urls_that_match_the_pattern() {
        assert!(validate_url("http://exa mple.com", &[]).is_err());
    }

    #[test]
    fn enforces_host_allow_list() {
        let allowed = vec!["example.com".to_string()];
        assert!(validate_url("https://EXAMPLE.com/a", &allowed).is_ok());
        let err = validate_url("https://internal.local/admin", &allowed).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
