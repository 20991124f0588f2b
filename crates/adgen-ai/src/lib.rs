//! AI service clients for the ad generation pipeline.
//!
//! - [`claude`]: Anthropic Messages API client for image selection and
//!   prompt generation
//! - [`ray`]: async video generation client (submit + poll)
//! - [`image`]: JPEG downscale/encode for API payloads

pub mod claude;
pub mod error;
pub mod image;
pub mod ray;

pub use claude::{ClaudeClient, LabeledImage};
pub use error::{AiError, AiResult};
pub use image::{encode_for_keyframe, encode_for_vision};
pub use ray::{JobHandle, JobPoll, RayClient, VideoGenRequest, VideoGenerator};
