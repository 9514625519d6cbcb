use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use tracing::error;

use crate::api::response;
use crate::extractor::ExtractError;
use crate::llm::SummarizeError;

pub const RATE_LIMIT_MESSAGE: &str = "rate limit exceeded";
const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream request timed out")]
    Timeout,

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { status, .. } => *status,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConfigError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::ConfigError(detail) | AppError::Internal(detail) => {
                // Detail stays in the server log only.
                error!(%detail, "internal error");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        response::error(status, message).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout
        } else {
            AppError::Internal(err.without_url().to_string())
        }
    }
}

impl From<SummarizeError> for AppError {
    fn from(err: SummarizeError) -> Self {
        match err {
            SummarizeError::EmptyInput => AppError::Validation(err.to_string()),
            SummarizeError::Upstream { status, message } => AppError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message,
            },
            SummarizeError::MalformedResponse(_) | SummarizeError::NoCandidate => AppError::Upstream {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: err.to_string(),
            },
            SummarizeError::Transport(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            AppError::Upstream { status: StatusCode::NOT_FOUND, message: "gone".into() }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Internal("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn summarize_errors_map_to_client_safe_errors() {
        let err: AppError = SummarizeError::NoCandidate.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err, AppError::Upstream { .. }));

        let err: AppError = SummarizeError::EmptyInput.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = SummarizeError::Upstream {
            status: 503,
            message: "Gemini API error: 503 Service Unavailable".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "Gemini API error: 503 Service Unavailable");
    }

    #[test]
    fn rate_limit_message_is_uniform() {
        assert_eq!(AppError::RateLimited.to_string(), RATE_LIMIT_MESSAGE);
    }
}
