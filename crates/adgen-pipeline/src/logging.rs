//! Structured job logging.
//!
//! Every video job logs under its deterministic artifact name so a run's
//! output can be grepped per clip.

use tracing::{error, info, warn};

/// Logger scoped to one video job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    artifact: String,
    stage: String,
}

impl JobLogger {
    /// Create a logger for one job and stage (e.g. "generate", "download").
    pub fn new(artifact: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            stage: stage.into(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            artifact = %self.artifact,
            stage = %self.stage,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            artifact = %self.artifact,
            stage = %self.stage,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            artifact = %self.artifact,
            stage = %self.stage,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            artifact = %self.artifact,
            stage = %self.stage,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            artifact = %self.artifact,
            stage = %self.stage,
            "Job completed: {}", message
        );
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_creation() {
        let logger = JobLogger::new("video_20250314_092653_01_01_hero.mp4", "generate");
        assert_eq!(logger.artifact(), "video_20250314_092653_01_01_hero.mp4");
    }
}
