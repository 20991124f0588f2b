//! Prompt generation stage output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::manifest::{SchemaError, SchemaResult, SCHEMA_VERSION};

/// One generated video prompt for a specific image.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoPrompt {
    /// 1-based order within the image's prompt list
    pub sequence: u32,

    /// Style tag, e.g. "Hero Showcase" / "Lifestyle Focus" / "Technical Detail"
    pub prompt_type: String,

    /// Full prompt text submitted to the video service
    pub prompt: String,

    #[serde(default)]
    pub camera_movement: String,

    #[serde(default)]
    pub lighting: String,

    #[serde(default)]
    pub mood: String,
}

/// Product analysis block accompanying each image's prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProductAnalysis {
    #[serde(default)]
    pub product_identification: String,

    #[serde(default)]
    pub key_features: Vec<String>,

    #[serde(default)]
    pub image_specific_details: String,

    #[serde(default)]
    pub visual_style: String,
}

/// Analysis and prompts for one selected image.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImageAnalysis {
    /// Source image file name
    pub image_filename: String,

    #[serde(default)]
    pub product_analysis: ProductAnalysis,

    /// Ordered prompts for this image
    pub video_prompts: Vec<VideoPrompt>,

    /// Commercial narrative arc for this image
    #[serde(default)]
    pub story_summary: String,
}

/// Per-image prompt sets written to `product_analysis_prompts.json`.
///
/// Created by the analysis stage and read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PromptSet {
    /// Document schema version
    #[serde(default)]
    pub schema_version: u32,

    /// One entry per selected image, in selection order
    pub per_image_analysis: Vec<ImageAnalysis>,
}

impl PromptSet {
    pub fn new(per_image_analysis: Vec<ImageAnalysis>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            per_image_analysis,
        }
    }

    /// Total number of prompts across all images.
    pub fn total_prompts(&self) -> usize {
        self.per_image_analysis
            .iter()
            .map(|a| a.video_prompts.len())
            .sum()
    }

    /// Parse and validate a prompt document.
    pub fn from_json(data: &[u8]) -> SchemaResult<Self> {
        let doc: Self = serde_json::from_slice(data)
            .map_err(|e| SchemaError::malformed("product_analysis_prompts", e))?;
        if doc.schema_version > SCHEMA_VERSION {
            return Err(SchemaError::unsupported_version(
                "product_analysis_prompts",
                doc.schema_version,
            ));
        }
        if doc.per_image_analysis.is_empty() {
            return Err(SchemaError::invalid(
                "product_analysis_prompts",
                "no per-image analyses",
            ));
        }
        Ok(doc)
    }
}
