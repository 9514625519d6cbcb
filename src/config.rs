use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use axum::http::HeaderValue;
use crate::error::{AppError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

/// Settings that shape the prompt and the returned summary.
#[derive(Clone, Debug)]
pub struct SummaryConfig {
    pub max_chars: usize,
    pub language: String,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub environment: Environment,
    /// CORS origin; `*` allows any caller.
    pub allowed_origin: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub summary: SummaryConfig,
    pub rate_limit: RateLimitConfig,
    pub upstream_timeout: Duration,
    pub static_dir: PathBuf,
    pub trust_proxy: bool,
    /// Empty means any host may be fetched.
    pub fetch_allowed_hosts: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = var("GEMINI_API_KEY")
            .ok_or_else(|| AppError::ConfigError("GEMINI_API_KEY is not set".to_string()))?;

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port: u16 = parse_var(&var, "PORT", 3000)?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;
        let server_addr = SocketAddr::new(ip, port);

        let environment = var("APP_ENV")
            .or_else(|| var("NODE_ENV"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        let allowed_origin = match (environment, var("ALLOWED_ORIGIN")) {
            (_, Some(origin)) => origin,
            (Environment::Production, None) => {
                return Err(AppError::ConfigError("ALLOWED_ORIGIN must be set in production".to_string()));
            }
            (_, None) => format!("http://localhost:{}", port),
        };
        if allowed_origin != "*" {
            HeaderValue::from_str(&allowed_origin)
                .map_err(|e| AppError::ConfigError(format!("Invalid ALLOWED_ORIGIN: {}", e)))?;
        }

        let max_chars: usize = parse_var(&var, "SUMMARY_MAX_CHARS", 100)?;
        if max_chars < 4 {
            return Err(AppError::ConfigError("SUMMARY_MAX_CHARS must be at least 4".to_string()));
        }

        let window_minutes: u64 = parse_var(&var, "RATE_LIMIT_WINDOW_MINUTES", 15)?;
        let timeout_secs: u64 = parse_var(&var, "UPSTREAM_TIMEOUT_SECS", 30)?;

        let trust_proxy = match var("TRUST_PROXY") {
            Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            None => false,
        };

        let fetch_allowed_hosts = var("FETCH_ALLOWED_HOSTS")
            .map(|list| {
                list.split(',')
                    .map(|h| h.trim().to_ascii_lowercase())
                    .filter(|h| !h.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            server_addr,
            environment,
            allowed_origin,
            gemini_api_key,
            gemini_api_base: var("GEMINI_API_BASE")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1".to_string()),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-pro".to_string()),
            summary: SummaryConfig {
                max_chars,
                language: var("SUMMARY_LANGUAGE").unwrap_or_else(|| "Japanese".to_string()),
            },
            rate_limit: RateLimitConfig {
                max_requests: parse_var(&var, "RATE_LIMIT_MAX", 10)?,
                window: Duration::from_secs(window_minutes * 60),
            },
            upstream_timeout: Duration::from_secs(timeout_secs),
            static_dir: PathBuf::from(var("STATIC_DIR").unwrap_or_else(|| "public".to_string())),
            trust_proxy,
            fetch_allowed_hosts,
        })
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_reference_deployment() {
        let config = load(&[("GEMINI_API_KEY", "k")]).unwrap();
        assert_eq!(config.server_addr.port(), 3000);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.allowed_origin, "http://localhost:3000");
        assert_eq!(config.summary.max_chars, 100);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(15 * 60));
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
        assert!(config.fetch_allowed_hosts.is_empty());
        assert!(!config.trust_proxy);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        assert!(matches!(load(&[]), Err(AppError::ConfigError(_))));
        assert!(matches!(load(&[("GEMINI_API_KEY", "  ")]), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = load(&[("GEMINI_API_KEY", "k"), ("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn production_requires_an_allowed_origin() {
        assert!(load(&[("GEMINI_API_KEY", "k"), ("NODE_ENV", "production")]).is_err());

        let config = load(&[
            ("GEMINI_API_KEY", "k"),
            ("NODE_ENV", "production"),
            ("ALLOWED_ORIGIN", "https://summaries.example.org"),
        ])
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.allowed_origin, "https://summaries.example.org");
    }

    #[test]
    fn allowed_hosts_are_normalized() {
        let config = load(&[
            ("GEMINI_API_KEY", "k"),
            ("FETCH_ALLOWED_HOSTS", " Example.com, ,news.example.org "),
            ("TRUST_PROXY", "true"),
        ])
        .unwrap();
        assert_eq!(config.fetch_allowed_hosts, vec!["example.com", "news.example.org"]);
        assert!(config.trust_proxy);
    }
}
