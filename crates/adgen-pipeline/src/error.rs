//! Pipeline error types.

use thiserror::Error;

use adgen_models::SessionId;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised by pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("No sessions recorded yet")]
    NoSessions,

    #[error("No artifacts found to merge")]
    NoArtifactsFound,

    #[error("Pipeline configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Schema(#[from] adgen_models::SchemaError),

    #[error(transparent)]
    Ai(#[from] adgen_ai::AiError),

    #[error(transparent)]
    Storage(#[from] adgen_storage::StorageError),

    #[error(transparent)]
    Media(#[from] adgen_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn missing_prerequisite(msg: impl Into<String>) -> Self {
        Self::MissingPrerequisite(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
