//! Pipeline orchestration: selection, analysis, generation.
//!
//! The generation stage fans one job per (image, prompt) pair out to the
//! video service, bounded by a semaphore, and aggregates terminal outcomes
//! into the session manifest, the generation report, and finally the
//! latest-session pointer. A failed job never aborts its siblings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use adgen_ai::{
    encode_for_keyframe, encode_for_vision, ClaudeClient, LabeledImage, VideoGenRequest,
    VideoGenerator,
};
use adgen_models::{
    GenerationReport, ImageSelection, JobStatus, LatestPointer, PromptSet, SessionId,
    SessionManifest, VideoJob,
};
use adgen_storage::{fetch_video_output, S3Client};

use crate::config::{images_dir, output_dir, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::poller::{await_completion, PollOutcome, PollPolicy};
use crate::retry::{retry_async, RetryConfig};
use crate::session::SessionStore;

/// Options for the generation stage.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Project folder
    pub folder: PathBuf,
    /// Bucket the video service writes outputs to
    pub s3_bucket: String,
    /// Key prefix within that bucket
    pub s3_prefix: String,
    /// Use each source image as the clip's opening frame
    pub use_keyframes: bool,
}

/// List product images in the folder, sorted by file name.
pub fn list_product_images(folder: &Path) -> PipelineResult<Vec<PathBuf>> {
    let dir = images_dir(folder);
    let entries = std::fs::read_dir(&dir).map_err(|_| {
        PipelineError::missing_prerequisite(format!("{} not found", dir.display()))
    })?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    let ext = ext.to_ascii_lowercase();
                    ext == "jpg" || ext == "jpeg" || ext == "png"
                })
                .unwrap_or(false)
        })
        .collect();

    if images.is_empty() {
        return Err(PipelineError::missing_prerequisite(format!(
            "no images in {}",
            dir.display()
        )));
    }

    images.sort();
    Ok(images)
}

/// Selection stage: pick the best product images and persist the choice.
pub async fn run_selection(
    store: &SessionStore,
    claude: &ClaudeClient,
    folder: &Path,
    num_images: usize,
) -> PipelineResult<ImageSelection> {
    let images = list_product_images(folder)?;
    info!("Analyzing {} candidate images", images.len());

    let mut labeled = Vec::with_capacity(images.len());
    for path in &images {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match encode_for_vision(path) {
            Ok(base64_jpeg) => labeled.push(LabeledImage {
                filename,
                base64_jpeg,
            }),
            Err(e) => warn!("Skipping unreadable image {}: {}", path.display(), e),
        }
    }
    if labeled.is_empty() {
        return Err(PipelineError::missing_prerequisite(
            "no readable images to select from",
        ));
    }

    let mut selection = claude.select_images(&labeled, num_images).await?;

    // Drop hallucinated file names before anything downstream trusts them.
    let img_dir = images_dir(folder);
    selection.selected_images.retain(|img| {
        let exists = img_dir.join(&img.filename).exists();
        if !exists {
            warn!("Selection names nonexistent image {}, dropping", img.filename);
        }
        exists
    });
    if selection.selected_images.is_empty() {
        return Err(PipelineError::missing_prerequisite(
            "selection contained no usable images",
        ));
    }
    selection.selected_images.truncate(num_images);

    store.write_selection(&selection)?;
    info!("Selected {} images", selection.selected_images.len());
    Ok(selection)
}

/// Analysis stage: generate video prompts per selected image and persist.
pub async fn run_analysis(
    store: &SessionStore,
    claude: &ClaudeClient,
    folder: &Path,
    selection: &ImageSelection,
    prompts_per_image: usize,
) -> PipelineResult<PromptSet> {
    let img_dir = images_dir(folder);
    let mut analyses = Vec::with_capacity(selection.selected_images.len());

    for selected in &selection.selected_images {
        let path = img_dir.join(&selected.filename);
        let base64_jpeg = encode_for_vision(&path)?;
        let mut analysis = claude
            .analyze_image(&selected.filename, &base64_jpeg, prompts_per_image)
            .await?;
        analysis.video_prompts.truncate(prompts_per_image);
        analyses.push(analysis);
    }

    let prompts = PromptSet::new(analyses);
    store.write_prompts(&prompts)?;
    info!(
        "Generated {} prompts across {} images",
        prompts.total_prompts(),
        prompts.per_image_analysis.len()
    );
    Ok(prompts)
}

/// Build the job list for a session: one job per (image, prompt) pair,
/// indices 1-based in selection/prompt order.
fn build_jobs(session: &SessionId, prompts: &PromptSet) -> Vec<VideoJob> {
    let mut jobs = Vec::with_capacity(prompts.total_prompts());
    for (i, analysis) in prompts.per_image_analysis.iter().enumerate() {
        for (j, prompt) in analysis.video_prompts.iter().enumerate() {
            jobs.push(VideoJob::new(
                session.clone(),
                (i + 1) as u32,
                (j + 1) as u32,
                &prompt.prompt_type,
                &analysis.image_filename,
                &prompt.prompt,
            ));
        }
    }
    jobs
}

/// Generation stage: submit every job, poll to terminal, download successes,
/// then write manifest, report, and the latest pointer (in that order).
///
/// Returns the report; a run where every job failed still writes all three
/// documents and is not an error.
pub async fn run_generation(
    store: &mut SessionStore,
    generator: Arc<dyn VideoGenerator>,
    s3: &S3Client,
    config: &PipelineConfig,
    options: &GenerationOptions,
    prompts: &PromptSet,
) -> PipelineResult<GenerationReport> {
    let session = store.mint_session()?;
    let out_dir = output_dir(&options.folder);
    std::fs::create_dir_all(&out_dir)?;

    // Encode keyframes once per image, not once per job.
    let img_dir = images_dir(&options.folder);
    let keyframes: Vec<Option<String>> = prompts
        .per_image_analysis
        .iter()
        .map(|analysis| {
            if !options.use_keyframes {
                return None;
            }
            match encode_for_keyframe(img_dir.join(&analysis.image_filename)) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(
                        "Keyframe encoding failed for {}, submitting without: {}",
                        analysis.image_filename, e
                    );
                    None
                }
            }
        })
        .collect();

    let jobs = build_jobs(&session, prompts);
    info!(
        "Session {}: dispatching {} jobs ({} max concurrent)",
        session,
        jobs.len(),
        config.max_concurrent_jobs
    );

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
    let policy = PollPolicy {
        interval: config.poll_interval,
        max_wait: config.max_wait,
    };

    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        let fallback = job.clone();
        let keyframe = keyframes
            .get(job.image_index as usize - 1)
            .cloned()
            .flatten();
        let generator = Arc::clone(&generator);
        let s3 = s3.clone();
        let policy = policy.clone();
        let semaphore = Arc::clone(&semaphore);
        let out_dir = out_dir.clone();
        let s3_bucket = options.s3_bucket.clone();
        let s3_prefix = options.s3_prefix.clone();
        let download_retries = config.download_retries;

        let handle = tokio::spawn(async move {
            // Closed only on runtime shutdown.
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return job.fail("executor shutting down"),
            };
            drive_job(
                job,
                keyframe,
                generator.as_ref(),
                &s3,
                &policy,
                &out_dir,
                &s3_bucket,
                &s3_prefix,
                download_retries,
            )
            .await
        });
        handles.push((fallback, handle));
    }

    let mut finished = Vec::with_capacity(handles.len());
    for (fallback, handle) in handles {
        match handle.await {
            Ok(job) => finished.push(job),
            Err(e) => {
                error!("Job task for {} panicked: {}", fallback.artifact_name(), e);
                finished.push(fallback.fail("job task panicked"));
            }
        }
    }
    finished.sort_by_key(|j| j.sort_key());

    let artifacts = finished
        .iter()
        .filter(|j| j.status == JobStatus::Succeeded)
        .cloned()
        .filter_map(|j| j.into_artifact())
        .collect();

    let manifest = SessionManifest::new(session.clone(), artifacts);
    store.write_manifest(&manifest)?;

    let report = GenerationReport::from_jobs(session.clone(), &finished);
    store.write_generation_report(&report)?;

    // Pointer goes last so a reader following it always finds the manifest.
    store.write_latest_pointer(&LatestPointer::new(session.clone()))?;

    info!(
        "Session {}: {} succeeded, {} failed",
        session, report.succeeded_count, report.failed_count
    );
    for line in session_summary(&finished) {
        info!("{}", line);
    }
    Ok(report)
}

/// End-of-run summary lines: one header per source image with its success
/// ratio, then the artifact name of each clip that made it.
///
/// Expects jobs sorted by (image index, prompt index).
fn session_summary(jobs: &[VideoJob]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut idx = 0;
    while idx < jobs.len() {
        let image_index = jobs[idx].image_index;
        let source = jobs[idx].source_image.clone();
        let mut total = 0usize;
        let mut succeeded = Vec::new();
        while idx < jobs.len() && jobs[idx].image_index == image_index {
            total += 1;
            if jobs[idx].status == JobStatus::Succeeded {
                succeeded.push(jobs[idx].artifact_name());
            }
            idx += 1;
        }
        lines.push(format!("{}: {}/{} clips", source, succeeded.len(), total));
        for name in succeeded {
            lines.push(format!("  {}", name));
        }
    }
    lines
}

/// Drive one job from submission to a terminal state. Never returns an
/// error: every failure mode lands in the job's status.
#[allow(clippy::too_many_arguments)]
async fn drive_job(
    job: VideoJob,
    keyframe: Option<String>,
    generator: &dyn VideoGenerator,
    s3: &S3Client,
    policy: &PollPolicy,
    out_dir: &Path,
    s3_bucket: &str,
    s3_prefix: &str,
    download_retries: u32,
) -> VideoJob {
    let logger = JobLogger::new(job.artifact_name(), "generate");
    logger.log_start(&format!(
        "image {} prompt {} ({})",
        job.image_index, job.prompt_index, job.style_tag
    ));

    let output_s3_uri = format!(
        "s3://{}/{}/{}/{}/",
        s3_bucket,
        s3_prefix,
        job.session,
        Uuid::new_v4()
    );
    let request = VideoGenRequest {
        prompt: job.prompt_text.clone(),
        keyframe_jpeg: keyframe,
        output_s3_uri,
    };

    let handle = match generator.submit(&request).await {
        Ok(handle) => handle,
        Err(e) => {
            logger.log_error(&format!("submission failed: {}", e));
            return job.fail(format!("submission failed: {}", e));
        }
    };
    let job = job.submitted(handle.0.clone()).polling();

    let outcome = match await_completion(generator, &handle, policy).await {
        Ok(outcome) => outcome,
        Err(e) => {
            logger.log_error(&format!("polling failed: {}", e));
            return job.fail(format!("polling failed: {}", e));
        }
    };

    match outcome {
        PollOutcome::Succeeded { output_location } => {
            let job = job.succeed(output_location.clone());
            let local_path = out_dir.join(job.artifact_name());

            let retry = RetryConfig::new("video_download").with_max_retries(download_retries);
            let download = retry_async(&retry, || {
                fetch_video_output(s3, &output_location, &local_path)
            })
            .await;

            match download {
                Ok(()) => {
                    logger.log_completion(&format!("downloaded to {}", local_path.display()));
                    job.with_local_file(local_path.to_string_lossy())
                }
                Err(e) => {
                    logger.log_error(&format!("download failed: {}", e));
                    job.fail(format!("download failed: {}", e))
                }
            }
        }
        PollOutcome::Failed { reason } => {
            logger.log_error(&format!("generation failed: {}", reason));
            job.fail(reason)
        }
        PollOutcome::TimedOut => {
            logger.log_warning("gave up waiting; remote job left running");
            job.time_out(policy.max_wait.as_secs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgen_ai::{AiError, AiResult, JobHandle, JobPoll};
    use adgen_models::{ImageAnalysis, ProductAnalysis, VideoPrompt};
    use tempfile::tempdir;

    use crate::session::SessionFilter;

    fn prompt(seq: u32, style: &str) -> VideoPrompt {
        VideoPrompt {
            sequence: seq,
            prompt_type: style.into(),
            prompt: format!("{} prompt text", style),
            camera_movement: String::new(),
            lighting: String::new(),
            mood: String::new(),
        }
    }

    fn prompt_set() -> PromptSet {
        PromptSet::new(vec![
            ImageAnalysis {
                image_filename: "a.jpg".into(),
                product_analysis: ProductAnalysis::default(),
                video_prompts: vec![prompt(1, "Hero Showcase"), prompt(2, "Lifestyle Focus")],
                story_summary: String::new(),
            },
            ImageAnalysis {
                image_filename: "b.jpg".into(),
                product_analysis: ProductAnalysis::default(),
                video_prompts: vec![prompt(1, "Technical Detail")],
                story_summary: String::new(),
            },
        ])
    }

    #[test]
    fn test_build_jobs_indices_and_names() {
        let session = SessionId::parse("20250314_092653").unwrap();
        let jobs = build_jobs(&session, &prompt_set());

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].sort_key(), (1, 1));
        assert_eq!(jobs[1].sort_key(), (1, 2));
        assert_eq!(jobs[2].sort_key(), (2, 1));
        assert_eq!(jobs[1].source_image, "a.jpg");
        assert_eq!(jobs[2].source_image, "b.jpg");
        assert_eq!(
            jobs[0].artifact_name(),
            "video_20250314_092653_01_01_hero_showcase.mp4"
        );
        // Same session, pairwise-distinct artifact names.
        let mut names: Vec<_> = jobs.iter().map(|j| j.artifact_name()).collect();
        names.dedup();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_list_product_images_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let img_dir = dir.path().join("product_images");
        std::fs::create_dir(&img_dir).unwrap();
        for name in ["b.PNG", "a.jpg", "c.jpeg", "notes.txt", "d.gif"] {
            std::fs::write(img_dir.join(name), b"x").unwrap();
        }

        let images = list_product_images(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg"]);
    }

    #[test]
    fn test_list_product_images_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            list_product_images(dir.path()),
            Err(PipelineError::MissingPrerequisite(_))
        ));
    }

    #[test]
    fn test_list_product_images_empty_dir() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("product_images")).unwrap();
        assert!(matches!(
            list_product_images(dir.path()),
            Err(PipelineError::MissingPrerequisite(_))
        ));
    }

    #[test]
    fn test_session_summary_groups_by_image() {
        let session = SessionId::parse("20250314_092653").unwrap();
        let mut jobs = build_jobs(&session, &prompt_set());
        // First image: one of two clips made it. Second image: none.
        jobs[0] = jobs[0].clone().succeed("s3://b/out/");
        jobs[1] = jobs[1].clone().fail("throttled");
        jobs[2] = jobs[2].clone().time_out(600);

        let lines = session_summary(&jobs);
        assert_eq!(
            lines,
            vec![
                "a.jpg: 1/2 clips",
                "  video_20250314_092653_01_01_hero_showcase.mp4",
                "b.jpg: 0/1 clips",
            ]
        );
    }

    /// Generator whose submissions are always rejected, for exercising the
    /// zero-success path without a network.
    struct RejectingGenerator;

    #[async_trait::async_trait]
    impl VideoGenerator for RejectingGenerator {
        async fn submit(&self, _request: &VideoGenRequest) -> AiResult<JobHandle> {
            Err(AiError::SubmissionRejected("service offline".into()))
        }

        async fn poll(&self, _handle: &JobHandle) -> AiResult<JobPoll> {
            Err(AiError::SubmissionRejected("nothing to poll".into()))
        }
    }

    #[tokio::test]
    async fn test_run_generation_all_failures_still_writes_documents() {
        std::env::set_var("AWS_REGION", "us-west-2");
        std::env::set_var("AWS_ACCESS_KEY_ID", "test");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "test");

        let dir = tempdir().unwrap();
        let mut store = SessionStore::new(dir.path());
        let s3 = S3Client::from_env().await.unwrap();
        let config = PipelineConfig::default();
        let options = GenerationOptions {
            folder: dir.path().to_path_buf(),
            s3_bucket: "bucket".into(),
            s3_prefix: "prefix".into(),
            use_keyframes: false,
        };

        let report = run_generation(
            &mut store,
            Arc::new(RejectingGenerator),
            &s3,
            &config,
            &options,
            &prompt_set(),
        )
        .await
        .unwrap();

        assert_eq!(report.total_attempted, 3);
        assert_eq!(report.succeeded_count, 0);
        assert_eq!(report.failed_count, 3);
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures.iter().all(|f| f
            .reason
            .as_deref()
            .is_some_and(|r| r.contains("submission failed"))));

        // Manifest exists with no artifacts, and the pointer already
        // resolves to the new session.
        let manifest = store.load_manifest(&report.session).unwrap();
        assert!(manifest.artifacts.is_empty());
        let latest = store.resolve(&SessionFilter::Latest).unwrap();
        assert_eq!(latest, vec![report.session.clone()]);
    }
}
