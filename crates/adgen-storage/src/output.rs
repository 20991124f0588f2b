//! Locating and fetching generated video outputs.
//!
//! The video service writes each job's result under the S3 prefix handed to
//! it at submission time. The exact object name is service-chosen, so the
//! download path is: list the prefix, pick the `.mp4`, fetch it.

use std::path::Path;

use tracing::{debug, warn};

use crate::client::S3Client;
use crate::error::{StorageError, StorageResult};

/// A parsed `s3://bucket/key` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
}

impl S3Uri {
    /// Parse an `s3://` URI into bucket and key.
    pub fn parse(uri: &str) -> StorageResult<Self> {
        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| StorageError::invalid_uri(uri))?;

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return Err(StorageError::invalid_uri(uri));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl std::fmt::Display for S3Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Download the video produced under `output_uri` to `local_path`.
///
/// Lists the output prefix and downloads the first `.mp4` object found.
/// Returns `NoVideoOutput` when the prefix holds no video.
pub async fn fetch_video_output(
    client: &S3Client,
    output_uri: &str,
    local_path: impl AsRef<Path>,
) -> StorageResult<()> {
    let uri = S3Uri::parse(output_uri)?;
    debug!("Fetching video output from {}", uri);

    let objects = client.list_objects(&uri.bucket, &uri.key).await?;

    let video_key = objects
        .iter()
        .find(|o| o.key.ends_with(".mp4"))
        .map(|o| o.key.clone())
        .ok_or_else(|| {
            warn!(
                "No .mp4 among {} objects under {}",
                objects.len(),
                output_uri
            );
            StorageError::NoVideoOutput(output_uri.to_string())
        })?;

    client.download_file(&uri.bucket, &video_key, local_path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bucket_and_key() {
        let uri = S3Uri::parse("s3://my-bucket/sessions/20250314_092653/abc/").unwrap();
        assert_eq!(uri.bucket, "my-bucket");
        assert_eq!(uri.key, "sessions/20250314_092653/abc/");
    }

    #[test]
    fn test_parse_bucket_only() {
        let uri = S3Uri::parse("s3://my-bucket").unwrap();
        assert_eq!(uri.bucket, "my-bucket");
        assert_eq!(uri.key, "");
    }

    #[test]
    fn test_parse_rejects_non_s3_scheme() {
        assert!(matches!(
            S3Uri::parse("https://my-bucket/key"),
            Err(StorageError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_bucket() {
        assert!(matches!(
            S3Uri::parse("s3:///key"),
            Err(StorageError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_display_round_trip() {
        let uri = S3Uri::parse("s3://bucket/a/b/c.mp4").unwrap();
        assert_eq!(uri.to_string(), "s3://bucket/a/b/c.mp4");
    }
}
