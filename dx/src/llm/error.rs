//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors from a provider call
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("provider returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider reported an error mid-stream, or the event source broke
    #[error("stream error: {0}")]
    Stream(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// HTTP statuses the provider uses for transient failures
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

impl LlmError {
    /// Worth repeating the same request
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) | LlmError::Stream(_) => true,
            LlmError::ApiError { status, .. } => is_retryable_status(*status),
            LlmError::Config(_) | LlmError::Json(_) => false,
        }
    }
}
