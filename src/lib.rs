pub mod api;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod llm;
pub mod rate_limit;

use std::sync::Arc;
use config::Config;
use error::Result;
use llm::GeminiClient;
use rate_limit::{InMemoryRateLimiter, RateLimiter};

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub gemini: Arc<GeminiClient>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    /// State backed by a process-local rate limiter sized from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let limiter = InMemoryRateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window);
        Self::with_rate_limiter(config, Arc::new(limiter))
    }

    pub fn with_rate_limiter(config: Config, rate_limiter: Arc<dyn RateLimiter>) -> Result<Self> {
        let http = fetcher::build_client(config.upstream_timeout)?;
        let gemini = GeminiClient::new(http.clone(), &config);

        Ok(AppState {
            config: Arc::new(config),
            http,
            gemini: Arc::new(gemini),
            rate_limiter,
        })
    }
}
