//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the directory product photos are read from.
pub const IMAGES_DIR: &str = "product_images";
/// Name of the directory finished videos land in.
pub const OUTPUT_DIR: &str = "generated_ads";

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum video jobs in flight at once
    pub max_concurrent_jobs: usize,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Per-job ceiling on total polling time
    pub max_wait: Duration,
    /// Download retry attempts after a job succeeds
    pub download_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(600),
            download_retries: 3,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("ADGEN_MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            poll_interval: Duration::from_secs(
                std::env::var("ADGEN_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_wait: Duration::from_secs(
                std::env::var("ADGEN_MAX_WAIT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            download_retries: std::env::var("ADGEN_DOWNLOAD_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        }
    }
}

/// The product images directory within a project folder.
pub fn images_dir(folder: &Path) -> PathBuf {
    folder.join(IMAGES_DIR)
}

/// The generated videos directory within a project folder.
pub fn output_dir(folder: &Path) -> PathBuf {
    folder.join(OUTPUT_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_wait, Duration::from_secs(600));
    }

    #[test]
    fn test_folder_layout() {
        let folder = Path::new("/data/watch");
        assert_eq!(images_dir(folder), Path::new("/data/watch/product_images"));
        assert_eq!(output_dir(folder), Path::new("/data/watch/generated_ads"));
    }
}
