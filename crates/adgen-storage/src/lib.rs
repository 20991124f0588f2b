//! S3 storage access for generated ad videos.
//!
//! The video generation service deposits finished renders in S3; this crate
//! wraps the AWS SDK with the small surface the pipeline needs: listing a
//! job's output prefix, downloading the video, and parsing `s3://` URIs.

pub mod client;
pub mod error;
pub mod output;

pub use client::{ObjectInfo, S3Client};
pub use error::{StorageError, StorageResult};
pub use output::{fetch_video_output, S3Uri};
