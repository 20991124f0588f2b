//! Shared data models for the adgen pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Sessions and deterministic artifact naming
//! - Video generation jobs and their status machine
//! - Image selections and per-image prompt sets
//! - Session manifests, the latest-session pointer, and run reports

pub mod artifact;
pub mod job;
pub mod manifest;
pub mod prompt;
pub mod report;
pub mod selection;
pub mod session;

// Re-export common types
pub use artifact::{artifact_file_name, slugify, VideoArtifact};
pub use job::{JobStatus, VideoJob};
pub use manifest::{LatestPointer, SchemaError, SchemaResult, SessionManifest, SCHEMA_VERSION};
pub use prompt::{ImageAnalysis, ProductAnalysis, PromptSet, VideoPrompt};
pub use report::{GenerationReport, JobOutcomeDetail, MergeReport};
pub use selection::{ImageSelection, SelectedImage};
pub use session::SessionId;
