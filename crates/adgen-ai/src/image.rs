//! Image encoding for API payloads.
//!
//! Product photos are downscaled and re-encoded as JPEG before being sent
//! anywhere: the video service caps keyframes at 1552px on the long edge,
//! and the vision model tops out well below the raw camera resolution.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

use crate::error::{AiError, AiResult};

/// Long-edge cap for video keyframe images.
const KEYFRAME_MAX_DIM: u32 = 1552;
/// Long-edge cap for images sent to the vision model.
const VISION_MAX_DIM: u32 = 7500;

/// Encode an image for use as a video keyframe: capped at 1552px, JPEG q90.
pub fn encode_for_keyframe(path: impl AsRef<Path>) -> AiResult<String> {
    encode_jpeg_base64(path.as_ref(), KEYFRAME_MAX_DIM, 90)
}

/// Encode an image for vision analysis: capped at 7500px, JPEG q85.
pub fn encode_for_vision(path: impl AsRef<Path>) -> AiResult<String> {
    encode_jpeg_base64(path.as_ref(), VISION_MAX_DIM, 85)
}

fn encode_jpeg_base64(path: &Path, max_dim: u32, quality: u8) -> AiResult<String> {
    let img = image::open(path)
        .map_err(|e| AiError::ImageEncoding(format!("{}: {}", path.display(), e)))?;

    let (width, height) = (img.width(), img.height());
    let (new_width, new_height) = scaled_dimensions(width, height, max_dim);

    let img = if (new_width, new_height) != (width, height) {
        debug!(
            "Resizing {} from {}x{} to {}x{}",
            path.display(),
            width,
            height,
            new_width,
            new_height
        );
        img.resize(new_width, new_height, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();

    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
        .map_err(|e| AiError::ImageEncoding(format!("{}: {}", path.display(), e)))?;

    Ok(BASE64.encode(&buffer))
}

/// Scale dimensions so the long edge fits within `max_dim`, preserving
/// aspect ratio. Images already within the cap are returned unchanged.
fn scaled_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let long_edge = width.max(height);
    if long_edge <= max_dim {
        return (width, height);
    }

    let ratio = max_dim as f64 / long_edge as f64;
    let new_width = ((width as f64 * ratio).round() as u32).max(1);
    let new_height = ((height as f64 * ratio).round() as u32).max(1);
    (new_width, new_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_scaling_within_cap() {
        assert_eq!(scaled_dimensions(1024, 768, 1552), (1024, 768));
        assert_eq!(scaled_dimensions(1552, 1552, 1552), (1552, 1552));
    }

    #[test]
    fn test_landscape_scaled_to_cap() {
        let (w, h) = scaled_dimensions(4000, 3000, 1552);
        assert_eq!(w, 1552);
        assert_eq!(h, 1164);
    }

    #[test]
    fn test_portrait_scaled_to_cap() {
        let (w, h) = scaled_dimensions(3000, 4000, 1552);
        assert_eq!(w, 1164);
        assert_eq!(h, 1552);
    }

    #[test]
    fn test_extreme_aspect_ratio_never_hits_zero() {
        let (w, h) = scaled_dimensions(100_000, 10, 1552);
        assert_eq!(w, 1552);
        assert!(h >= 1);
    }
}
