use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
///
/// Only infrastructure failures abort a search. Empty result sets are not errors, and
/// LLM failures are reported through [`LlmError`] and degrade instead of propagating.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid filters: {0}")]
    InvalidFilters(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Metadata store unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Embedding service error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidQuery(msg) | AppError::InvalidFilters(msg) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::IndexUnavailable(_)
            | AppError::MetadataUnavailable(_)
            | AppError::Embedding(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Cache(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            // 499 is the de-facto "client closed request" code
            AppError::Cancelled => (
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failures of the text-completion collaborator
///
/// Never surfaced to callers: the re-ranker logs these and falls back to the fused order.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM call timed out after {0} ms")]
    Timeout(u64),

    #[error("LLM provider rate limited the request")]
    RateLimited,

    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("LLM returned malformed output: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else {
            LlmError::Provider(err.to_string())
        }
    }
}
