//! Session-tracked video ad generation pipeline.
//!
//! Stages: image selection, prompt generation, fan-out video generation
//! with polling, artifact download, session manifest + report persistence,
//! and manifest-driven merging.

pub mod config;
pub mod error;
pub mod logging;
pub mod merge;
pub mod orchestrator;
pub mod poller;
pub mod retry;
pub mod session;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use merge::{run_merge, select_for_merge, MergeRequest, MergeSelection};
pub use orchestrator::{run_analysis, run_generation, run_selection, GenerationOptions};
pub use poller::{await_completion, PollOutcome, PollPolicy};
pub use session::{SessionFilter, SessionStore};
