//! AI client error types.

use thiserror::Error;

/// Result type for AI operations.
pub type AiResult<T> = Result<T, AiError>;

/// Errors from the Claude and video generation clients.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Failed to configure AI client: {0}")]
    ConfigError(String),

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API returned {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Video job submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Image encoding failed: {0}")]
    ImageEncoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}
