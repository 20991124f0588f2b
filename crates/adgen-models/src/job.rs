//! Video generation job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::artifact::{artifact_file_name, VideoArtifact};
use crate::session::SessionId;

/// Status of one video generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Request accepted by the service, not yet polled
    #[default]
    Submitted,
    /// Actively polling for a terminal state
    Polling,
    /// Service reported completion and an output location
    Succeeded,
    /// Service reported a terminal failure
    Failed,
    /// Local poll deadline elapsed while the job was still in progress
    TimedOut,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Polling => "polling",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One request to the external video-generation service, tracked from
/// submission to a terminal state. Owned exclusively by the worker driving it
/// until terminal, then handed off for aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoJob {
    /// Session this job belongs to
    pub session: SessionId,

    /// 1-based index of the source image
    pub image_index: u32,

    /// 1-based index of the prompt within that image
    pub prompt_index: u32,

    /// Style tag of the prompt (e.g. "Hero Showcase")
    pub style_tag: String,

    /// Source image file name
    pub source_image: String,

    /// Prompt text submitted to the service
    pub prompt_text: String,

    /// External job handle (invocation ARN) once submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invocation_arn: Option<String>,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Remote output location, set on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,

    /// Local file path, set once the output has been downloaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_file: Option<String>,

    /// Failure reason, set on failure or timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Submission timestamp
    pub submitted_at: DateTime<Utc>,

    /// Timestamp of the terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl VideoJob {
    /// Create a job for one (image, prompt) pair.
    pub fn new(
        session: SessionId,
        image_index: u32,
        prompt_index: u32,
        style_tag: impl Into<String>,
        source_image: impl Into<String>,
        prompt_text: impl Into<String>,
    ) -> Self {
        Self {
            session,
            image_index,
            prompt_index,
            style_tag: style_tag.into(),
            source_image: source_image.into(),
            prompt_text: prompt_text.into(),
            invocation_arn: None,
            status: JobStatus::Submitted,
            output_location: None,
            local_file: None,
            error: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    /// The deterministic artifact name this job produces on success.
    pub fn artifact_name(&self) -> String {
        artifact_file_name(
            &self.session,
            self.image_index,
            self.prompt_index,
            &self.style_tag,
        )
    }

    /// Record the external handle returned by submission.
    pub fn submitted(mut self, invocation_arn: impl Into<String>) -> Self {
        self.invocation_arn = Some(invocation_arn.into());
        self.status = JobStatus::Submitted;
        self
    }

    /// Enter the polling state.
    pub fn polling(mut self) -> Self {
        self.status = JobStatus::Polling;
        self
    }

    /// Terminal: service reported completion.
    pub fn succeed(mut self, output_location: impl Into<String>) -> Self {
        self.status = JobStatus::Succeeded;
        self.output_location = Some(output_location.into());
        self.finished_at = Some(Utc::now());
        self
    }

    /// Terminal: service reported failure, or submission was rejected.
    pub fn fail(mut self, reason: impl Into<String>) -> Self {
        self.status = JobStatus::Failed;
        self.error = Some(reason.into());
        self.finished_at = Some(Utc::now());
        self
    }

    /// Terminal: local deadline elapsed. The remote job is not cancelled,
    /// only local tracking stops.
    pub fn time_out(mut self, max_wait_secs: u64) -> Self {
        self.status = JobStatus::TimedOut;
        self.error = Some(format!(
            "generation still in progress after {}s, gave up tracking",
            max_wait_secs
        ));
        self.finished_at = Some(Utc::now());
        self
    }

    /// Record the local download path for a succeeded job.
    pub fn with_local_file(mut self, path: impl Into<String>) -> Self {
        self.local_file = Some(path.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Stable ordering key used when aggregating outcomes.
    pub fn sort_key(&self) -> (u32, u32) {
        (self.image_index, self.prompt_index)
    }

    /// Convert a succeeded job into its manifest artifact entry.
    ///
    /// Returns `None` unless the job reached `Succeeded`.
    pub fn into_artifact(self) -> Option<VideoArtifact> {
        if self.status != JobStatus::Succeeded {
            return None;
        }
        Some(VideoArtifact {
            file_name: self.artifact_name(),
            image_index: self.image_index,
            prompt_index: self.prompt_index,
            style_tag: self.style_tag,
            source_image: Some(self.source_image),
            s3_location: self.output_location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> VideoJob {
        VideoJob::new(
            SessionId::parse("20250314_092653").unwrap(),
            1,
            2,
            "Hero Showcase",
            "front.jpg",
            "Wide shot, product centered",
        )
    }

    #[test]
    fn test_job_creation() {
        let j = job();
        assert_eq!(j.status, JobStatus::Submitted);
        assert!(!j.is_terminal());
        assert_eq!(
            j.artifact_name(),
            "video_20250314_092653_01_02_hero_showcase.mp4"
        );
    }

    #[test]
    fn test_success_transition() {
        let j = job()
            .submitted("arn:aws:bedrock:us-west-2::async-invoke/abc")
            .polling()
            .succeed("s3://bucket/prefix/abc/");
        assert_eq!(j.status, JobStatus::Succeeded);
        assert!(j.is_terminal());
        assert!(j.finished_at.is_some());

        let artifact = j.into_artifact().unwrap();
        assert_eq!(artifact.sort_key(), (1, 2));
        assert_eq!(artifact.s3_location.as_deref(), Some("s3://bucket/prefix/abc/"));
    }

    #[test]
    fn test_failed_job_yields_no_artifact() {
        let j = job().fail("throttled");
        assert_eq!(j.status, JobStatus::Failed);
        assert!(j.into_artifact().is_none());
    }

    #[test]
    fn test_timeout_is_terminal_failure() {
        let j = job().polling().time_out(600);
        assert_eq!(j.status, JobStatus::TimedOut);
        assert!(j.is_terminal());
        assert!(j.error.as_deref().unwrap().contains("600"));
        assert!(j.into_artifact().is_none());
    }
}
