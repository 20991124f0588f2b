//! Generation and merge run reports.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobStatus, VideoJob};
use crate::manifest::SCHEMA_VERSION;
use crate::session::SessionId;

/// Detail line for a single job outcome.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobOutcomeDetail {
    /// Deterministic artifact name the job was producing
    pub file_name: String,

    /// Terminal status
    pub status: JobStatus,

    /// Failure reason, absent for successes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Append-only summary of one generation run, written once at stage end.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationReport {
    pub schema_version: u32,
    pub session: SessionId,
    pub created_at: DateTime<Utc>,

    /// Jobs dispatched (images x prompts)
    pub total_attempted: u32,
    pub succeeded_count: u32,
    pub failed_count: u32,

    /// One entry per non-success, in (image index, prompt index) order
    pub failures: Vec<JobOutcomeDetail>,

    /// Fixed output parameters used for every job
    pub aspect_ratio: String,
    pub duration: String,
    pub resolution: String,
}

impl GenerationReport {
    /// Aggregate terminal jobs into a report.
    ///
    /// Jobs are re-sorted by (image index, prompt index) so the report is
    /// deterministic regardless of completion order.
    pub fn from_jobs(session: SessionId, jobs: &[VideoJob]) -> Self {
        let mut sorted: Vec<&VideoJob> = jobs.iter().collect();
        sorted.sort_by_key(|j| j.sort_key());

        let succeeded = sorted
            .iter()
            .filter(|j| j.status == JobStatus::Succeeded)
            .count() as u32;

        let failures = sorted
            .iter()
            .filter(|j| j.status != JobStatus::Succeeded)
            .map(|j| JobOutcomeDetail {
                file_name: j.artifact_name(),
                status: j.status,
                reason: j.error.clone(),
            })
            .collect::<Vec<_>>();

        Self {
            schema_version: SCHEMA_VERSION,
            session,
            created_at: Utc::now(),
            total_attempted: sorted.len() as u32,
            succeeded_count: succeeded,
            failed_count: failures.len() as u32,
            failures,
            aspect_ratio: "16:9".to_string(),
            duration: "5s".to_string(),
            resolution: "720p".to_string(),
        }
    }
}

/// Summary of one merge run, written once.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MergeReport {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,

    /// Session the merge was filtered to; absent when merging all sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionId>,

    /// Source videos in merge order
    pub source_videos: Vec<String>,

    /// Manifest entries whose backing file was gone and was skipped
    #[serde(default)]
    pub skipped_missing: Vec<String>,

    /// Output file name
    pub output_video: String,

    /// Whether fade transitions were applied
    pub transition: bool,
}

impl MergeReport {
    pub fn new(
        session: Option<SessionId>,
        source_videos: Vec<String>,
        skipped_missing: Vec<String>,
        output_video: impl Into<String>,
        transition: bool,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            session,
            source_videos,
            skipped_missing,
            output_video: output_video.into(),
            transition,
        }
    }
}
