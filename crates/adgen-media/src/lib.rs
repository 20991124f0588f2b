#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for merging generated ad videos.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building for multi-input invocations
//! - FFprobe-based video inspection
//! - The merge primitive: concat-demuxer copy merge, or re-encode with
//!   fade transitions

pub mod command;
pub mod error;
pub mod merge;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use merge::{merge_videos, MergeOptions};
pub use probe::{probe_video, VideoInfo};
