//! Deterministic artifact naming.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::session::SessionId;

/// Build the artifact file name for a generated video.
///
/// Format: `video_{session}_{image:02}_{prompt:02}_{slug}.mp4`.
///
/// The name is a pure function of its inputs and is collision-free within a
/// session: image and prompt indices are zero-padded so that lexicographic
/// order of names equals (session, image index, prompt index) order, which
/// the merge selector relies on.
pub fn artifact_file_name(
    session: &SessionId,
    image_index: u32,
    prompt_index: u32,
    style_tag: &str,
) -> String {
    format!(
        "video_{}_{:02}_{:02}_{}.mp4",
        session,
        image_index,
        prompt_index,
        slugify(style_tag)
    )
}

/// Lowercase a style tag and collapse non-alphanumerics to underscores,
/// keeping names filesystem-safe.
pub fn slugify(tag: &str) -> String {
    let mut slug = String::with_capacity(tag.len());
    let mut last_was_sep = true;
    for c in tag.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("unknown");
    }
    slug
}

/// One generated video, persisted under its deterministic name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoArtifact {
    /// Deterministic file name within the output directory
    pub file_name: String,

    /// 1-based index of the source image in the selection
    pub image_index: u32,

    /// 1-based index of the prompt for that image
    pub prompt_index: u32,

    /// Style tag of the prompt that produced this video
    pub style_tag: String,

    /// Source image file name, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,

    /// Remote output location the video was downloaded from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_location: Option<String>,
}

impl VideoArtifact {
    /// Stable ordering key within a session.
    pub fn sort_key(&self) -> (u32, u32) {
        (self.image_index, self.prompt_index)
    }
}

impl PartialOrd for VideoArtifact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VideoArtifact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.file_name.cmp(&other.file_name))
    }
}
