use axum::{
    routing::post,
    Router,
    extract::{ConnectInfo, Json, Request, State, rejection::JsonRejection},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::api::models::{FetchUrlRequest, FetchUrlResponse, SummarizeRequest, SummarizeResponse};
use crate::api::response;
use crate::extractor::extract_text;
use crate::fetcher::{fetch_html, validate_url};
use crate::rate_limit::RateLimitDecision;
use crate::AppState;

const RATELIMIT_LIMIT: &str = "ratelimit-limit";
const RATELIMIT_REMAINING: &str = "ratelimit-remaining";
const RATELIMIT_RESET: &str = "ratelimit-reset";

pub fn create_router(app_state: AppState) -> Router {
    let api = Router::new()
        .route("/summarize", post(summarize_handler))
        .route("/fetch-url", post(fetch_url_handler))
        .fallback(api_not_found)
        .layer(middleware::from_fn_with_state(app_state.clone(), rate_limit));

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(app_state.config.static_dir.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&app_state.config.allowed_origin))
        .with_state(app_state)
}

async fn api_not_found() -> Response {
    response::error(StatusCode::NOT_FOUND, "Unknown API endpoint.".to_string()).into_response()
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            warn!(%origin, error = %e, "ignoring invalid CORS origin");
            layer
        }
    }
}

/// Gate in front of every `/api` route.
async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_key(&req, state.config.trust_proxy);
    let decision = state.rate_limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        warn!(client = %key, "rate limit exceeded");
        AppError::RateLimited.into_response()
    };

    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Peer IP, or with `trust_proxy` the hop appended by the proxy in front of
/// us (the rightmost `X-Forwarded-For` entry; earlier ones are caller-supplied).
fn client_key(req: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let reset_secs = ceil_secs(decision.reset_after);
    headers.insert(HeaderName::from_static(RATELIMIT_LIMIT), HeaderValue::from(decision.limit));
    headers.insert(HeaderName::from_static(RATELIMIT_REMAINING), HeaderValue::from(decision.remaining));
    headers.insert(HeaderName::from_static(RATELIMIT_RESET), HeaderValue::from(reset_secs));
    if !decision.allowed {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(reset_secs));
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

async fn summarize_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SummarizeRequest>, JsonRejection>,
) -> Response {
    let start_time = Instant::now();
    let result = process_summarize_request(&state, payload).await;

    match result {
        Ok(response_data) => {
            info!(elapsed = ?start_time.elapsed(), "summary produced");
            response::success(response_data).into_response()
        }
        Err(err) => {
            log_failure("summarize", &err, start_time);
            err.into_response()
        }
    }
}

async fn process_summarize_request(
    state: &AppState,
    payload: std::result::Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<SummarizeResponse> {
    let Json(req) = payload.map_err(invalid_body)?;

    let text = req.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AppError::Validation("No text provided to summarize.".to_string()));
    }

    info!(chars = text.chars().count(), "summarizing text");
    let summary = state.gemini.summarize(&text).await?;

    Ok(SummarizeResponse { summary })
}

async fn fetch_url_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FetchUrlRequest>, JsonRejection>,
) -> Response {
    let start_time = Instant::now();
    let result = process_fetch_request(&state, payload).await;

    match result {
        Ok(response_data) => {
            info!(
                elapsed = ?start_time.elapsed(),
                bytes = response_data.content.len(),
                "page fetched"
            );
            response::success(response_data).into_response()
        }
        Err(err) => {
            log_failure("fetch-url", &err, start_time);
            err.into_response()
        }
    }
}

async fn process_fetch_request(
    state: &AppState,
    payload: std::result::Result<Json<FetchUrlRequest>, JsonRejection>,
) -> Result<FetchUrlResponse> {
    let Json(req) = payload.map_err(invalid_body)?;

    let url = validate_url(req.url.as_deref().unwrap_or_default(), &state.config.fetch_allowed_hosts)?;
    info!(%url, "fetching page");

    let content = fetch_html(&state.http, url).await?;

    let text = if req.extract {
        Some(extract_text(&content)?)
    } else {
        None
    };

    Ok(FetchUrlResponse { content, text })
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}

fn log_failure(operation: &str, err: &AppError, start_time: Instant) {
    let elapsed = start_time.elapsed();
    match err {
        AppError::Validation(_) | AppError::Extraction(_) => {
            info!(operation, error = %err, ?elapsed, "request rejected");
        }
        _ => warn!(operation, error = %err, ?elapsed, "request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(addr: &str, forwarded: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/summarize");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn client_key_uses_peer_address() {
        let req = request_from("192.0.2.10:51234", Some("203.0.113.7"));
        assert_eq!(client_key(&req, false), "192.0.2.10");
    }

    #[test]
    fn client_key_honours_forwarded_for_when_trusted() {
        let req = request_from("10.0.0.2:8080", Some("198.51.100.99, 203.0.113.7"));
        assert_eq!(client_key(&req, true), "203.0.113.7");

        // A spoofed leading entry does not change the key.
        let req = request_from("10.0.0.2:8080", Some("192.0.2.1, 203.0.113.7"));
        assert_eq!(client_key(&req, true), "203.0.113.7");

        let req = request_from("10.0.0.2:8080", None);
        assert_eq!(client_key(&req, true), "10.0.0.2");
    }

    #[test]
    fn denied_requests_carry_retry_after() {
        let mut headers = HeaderMap::new();
        let decision = RateLimitDecision {
            allowed: false,
            limit: 10,
            remaining: 0,
            reset_after: Duration::from_millis(90_500),
        };
        apply_rate_limit_headers(&mut headers, &decision);
        assert_eq!(headers["ratelimit-limit"], "10");
        assert_eq!(headers["ratelimit-remaining"], "0");
        assert_eq!(headers["ratelimit-reset"], "91");
        assert_eq!(headers[header::RETRY_AFTER], "91");
    }
}
