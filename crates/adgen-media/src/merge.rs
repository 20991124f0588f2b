//! The merge primitive: combine an ordered list of videos into one file.
//!
//! Two strategies:
//! - concat demuxer with stream copy (fast, no re-encode) when no
//!   transitions are requested;
//! - a scale/pad/fade filter graph re-encoded with libx264 when fade
//!   transitions are requested.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Options controlling a merge invocation.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Apply fade transitions between inputs (forces re-encode)
    pub transition: bool,
    /// Duration of each fade, in seconds
    pub transition_duration: f64,
    /// Kill FFmpeg after this many seconds
    pub timeout_secs: u64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            transition: false,
            transition_duration: 0.5,
            timeout_secs: 1800,
        }
    }
}

/// Merge `inputs` (in order) into `output`.
pub async fn merge_videos(
    inputs: &[PathBuf],
    output: &Path,
    options: &MergeOptions,
) -> MediaResult<()> {
    if inputs.is_empty() {
        return Err(MediaError::NoInputs);
    }
    for input in inputs {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.clone()));
        }
    }

    info!(
        "Merging {} videos into {} (transition: {})",
        inputs.len(),
        output.display(),
        options.transition
    );

    if options.transition {
        merge_with_transitions(inputs, output, options).await
    } else {
        merge_concat(inputs, output, options).await
    }
}

/// Concat-demuxer merge: stream copy, no re-encoding.
async fn merge_concat(inputs: &[PathBuf], output: &Path, options: &MergeOptions) -> MediaResult<()> {
    let list_path = output.with_extension("concat_list.txt");
    tokio::fs::write(&list_path, build_concat_list(inputs)).await?;

    let cmd = FfmpegCommand::new(&list_path, output)
        .input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
        .copy_codecs();

    let result = FfmpegRunner::new()
        .with_timeout(options.timeout_secs)
        .run(&cmd)
        .await;

    // The list file is scratch either way.
    let _ = tokio::fs::remove_file(&list_path).await;
    result
}

/// Re-encoding merge with fade in/out between inputs.
///
/// All inputs are scaled and padded to the first video's resolution so the
/// concat filter accepts them.
async fn merge_with_transitions(
    inputs: &[PathBuf],
    output: &Path,
    options: &MergeOptions,
) -> MediaResult<()> {
    let mut infos: Vec<VideoInfo> = Vec::with_capacity(inputs.len());
    for input in inputs {
        infos.push(probe_video(input).await?);
    }

    let filter = build_transition_filter(&infos, options.transition_duration);
    debug!("Transition filter graph: {}", filter);

    let cmd = FfmpegCommand::with_inputs(inputs, output)
        .filter_complex(filter)
        .output_args(["-map", "[outv]"])
        .video_codec("libx264")
        .preset("medium")
        .crf(23)
        .output_args(["-pix_fmt", "yuv420p"]);

    FfmpegRunner::new()
        .with_timeout(options.timeout_secs)
        .run(&cmd)
        .await
}

/// Build the concat demuxer list file contents.
///
/// Single quotes in paths are escaped per the concat demuxer's quoting rules.
fn build_concat_list(inputs: &[PathBuf]) -> String {
    let mut list = String::new();
    for input in inputs {
        let escaped = input.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{}'\n", escaped));
    }
    list
}

/// Build the fade/concat filter graph.
///
/// Every input is scaled and padded to the first input's resolution; each
/// input except the first fades in, each except the last fades out near its
/// end, and the processed streams are concatenated into `[outv]`.
fn build_transition_filter(infos: &[VideoInfo], transition_duration: f64) -> String {
    let target_width = infos[0].width;
    let target_height = infos[0].height;

    let mut parts: Vec<String> = Vec::with_capacity(infos.len() + 1);

    for (i, info) in infos.iter().enumerate() {
        let mut chain = format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
            i = i,
            w = target_width,
            h = target_height,
        );

        if i > 0 {
            chain.push_str(&format!(",fade=t=in:st=0:d={}", transition_duration));
        }
        if i < infos.len() - 1 && info.duration > transition_duration {
            let fade_start = info.duration - transition_duration;
            chain.push_str(&format!(
                ",fade=t=out:st={:.3}:d={}",
                fade_start, transition_duration
            ));
        }

        chain.push_str(&format!("[v{}]", i));
        parts.push(chain);
    }

    let mut concat = String::new();
    for i in 0..infos.len() {
        concat.push_str(&format!("[v{}]", i));
    }
    concat.push_str(&format!("concat=n={}:v=1:a=0[outv]", infos.len()));
    parts.push(concat);

    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32, duration: f64) -> VideoInfo {
        VideoInfo {
            duration,
            width,
            height,
            codec: "h264".into(),
        }
    }

    #[test]
    fn test_concat_list_format() {
        let list = build_concat_list(&[PathBuf::from("/ads/a.mp4"), PathBuf::from("/ads/b.mp4")]);
        assert_eq!(list, "file '/ads/a.mp4'\nfile '/ads/b.mp4'\n");
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = build_concat_list(&[PathBuf::from("/ads/it's.mp4")]);
        assert!(list.contains("'\\''"));
    }

    #[test]
    fn test_transition_filter_shape() {
        let filter = build_transition_filter(&[info(1280, 720, 5.0), info(640, 480, 5.0)], 0.5);

        // Both inputs normalized to the first video's resolution.
        assert!(filter.contains("scale=1280:720"));
        assert!(!filter.contains("scale=640:480"));

        // First input fades out only; second fades in only.
        assert!(filter.contains("[0:v]"));
        assert!(filter.contains("fade=t=out:st=4.500:d=0.5[v0]"));
        assert!(filter.contains(",fade=t=in:st=0:d=0.5"));
        assert!(filter.ends_with("concat=n=2:v=1:a=0[outv]"));
    }

    #[test]
    fn test_transition_filter_single_input_has_no_fades() {
        let filter = build_transition_filter(&[info(1280, 720, 5.0)], 0.5);
        assert!(!filter.contains("fade"));
        assert!(filter.ends_with("concat=n=1:v=1:a=0[outv]"));
    }
}
