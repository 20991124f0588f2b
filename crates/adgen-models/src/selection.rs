//! Image selection stage output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::manifest::{SchemaError, SchemaResult, SCHEMA_VERSION};

/// One image chosen by the selection service, with its rationale.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SelectedImage {
    /// File name within `product_images/`
    pub filename: String,

    /// Why this image was selected
    #[serde(default)]
    pub reason: String,

    /// Key visual features called out by the selector
    #[serde(default)]
    pub visual_features: String,

    /// Text presence assessment ("none" / "minimal" / "significant")
    #[serde(default)]
    pub text_presence: String,

    /// Suggested use in the video ad
    #[serde(default)]
    pub suggested_use: String,
}

/// Ordered selection written to `selected_images.json`.
///
/// Created once by the selection stage and read-only afterward; persisted
/// independent of any session so it can be reused across runs with
/// `--skip-selection`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImageSelection {
    /// Document schema version
    #[serde(default)]
    pub schema_version: u32,

    /// Ranked selection, best first
    pub selected_images: Vec<SelectedImage>,

    /// Overall assessment from the selector
    #[serde(default)]
    pub summary: String,
}

impl ImageSelection {
    pub fn new(selected_images: Vec<SelectedImage>, summary: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            selected_images,
            summary: summary.into(),
        }
    }

    /// Parse and validate a selection document.
    pub fn from_json(data: &[u8]) -> SchemaResult<Self> {
        let doc: Self = serde_json::from_slice(data)
            .map_err(|e| SchemaError::malformed("selected_images", e))?;
        // Version 0 documents predate versioning and are accepted as-is.
        if doc.schema_version > SCHEMA_VERSION {
            return Err(SchemaError::unsupported_version(
                "selected_images",
                doc.schema_version,
            ));
        }
        if doc.selected_images.is_empty() {
            return Err(SchemaError::invalid(
                "selected_images",
                "no images in selection",
            ));
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_validation() {
        let doc = ImageSelection::new(
            vec![SelectedImage {
                filename: "front.jpg".into(),
                reason: "clean, text-free shot".into(),
                visual_features: "full product view".into(),
                text_presence: "none".into(),
                suggested_use: "hero shot".into(),
            }],
            "one strong candidate",
        );
        let bytes = serde_json::to_vec(&doc).unwrap();
        let parsed = ImageSelection::from_json(&bytes).unwrap();
        assert_eq!(parsed.selected_images[0].filename, "front.jpg");
    }

    #[test]
    fn test_empty_selection_rejected() {
        let bytes = br#"{"schema_version":1,"selected_images":[],"summary":""}"#;
        assert!(matches!(
            ImageSelection::from_json(bytes),
            Err(SchemaError::Invalid { .. })
        ));
    }

    #[test]
    fn test_future_version_rejected() {
        let bytes = br#"{"schema_version":99,"selected_images":[{"filename":"a.jpg"}]}"#;
        assert!(matches!(
            ImageSelection::from_json(bytes),
            Err(SchemaError::UnsupportedVersion { .. })
        ));
    }
}
