//! Session manifests and the latest-session pointer.
//!
//! These are the durable JSON documents later runs read back, so they carry
//! an explicit schema version and are validated on read: a malformed or
//! future-version document fails with a specific [`SchemaError`] instead of
//! a generic parse failure.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::VideoArtifact;
use crate::session::SessionId;

/// Current schema version for all durable adgen documents.
pub const SCHEMA_VERSION: u32 = 1;

/// Result type for schema validation.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised when reading durable documents back.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{document}: malformed JSON: {source}")]
    Malformed {
        document: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{document}: unsupported schema version {version} (max {SCHEMA_VERSION})")]
    UnsupportedVersion { document: String, version: u32 },

    #[error("{document}: {reason}")]
    Invalid { document: String, reason: String },
}

impl SchemaError {
    pub fn malformed(document: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Malformed {
            document: document.into(),
            source,
        }
    }

    pub fn unsupported_version(document: impl Into<String>, version: u32) -> Self {
        Self::UnsupportedVersion {
            document: document.into(),
            version,
        }
    }

    pub fn invalid(document: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            document: document.into(),
            reason: reason.into(),
        }
    }
}

/// Durable record of which artifacts belong to a session.
///
/// Written once, after the generation stage completes, containing only
/// confirmed successes in (image index, prompt index) order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionManifest {
    /// Document schema version
    pub schema_version: u32,

    /// Session this manifest describes
    pub session: SessionId,

    /// When the manifest was written
    pub created_at: DateTime<Utc>,

    /// Succeeded artifacts, sorted by (image index, prompt index)
    pub artifacts: Vec<VideoArtifact>,
}

impl SessionManifest {
    /// Build a manifest from succeeded artifacts, enforcing stable order.
    pub fn new(session: SessionId, mut artifacts: Vec<VideoArtifact>) -> Self {
        artifacts.sort();
        Self {
            schema_version: SCHEMA_VERSION,
            session,
            created_at: Utc::now(),
            artifacts,
        }
    }

    /// Parse and validate a manifest document.
    pub fn from_json(data: &[u8]) -> SchemaResult<Self> {
        let doc: Self = serde_json::from_slice(data)
            .map_err(|e| SchemaError::malformed("session_videos", e))?;
        if doc.schema_version > SCHEMA_VERSION {
            return Err(SchemaError::unsupported_version(
                "session_videos",
                doc.schema_version,
            ));
        }
        Ok(doc)
    }
}

/// Pointer to the most recently completed session.
///
/// Overwritten (atomically, write-temp-then-rename) at the end of every
/// generation run, including zero-success runs. Readers trust this pointer
/// over lexicographic comparison of session ids.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LatestPointer {
    /// Document schema version
    pub schema_version: u32,

    /// The most recently completed session
    pub session: SessionId,

    /// When that session's generation stage completed
    pub completed_at: DateTime<Utc>,
}

impl LatestPointer {
    pub fn new(session: SessionId) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            session,
            completed_at: Utc::now(),
        }
    }

    /// Parse and validate a pointer document.
    pub fn from_json(data: &[u8]) -> SchemaResult<Self> {
        let doc: Self = serde_json::from_slice(data)
            .map_err(|e| SchemaError::malformed("latest_session_videos", e))?;
        if doc.schema_version > SCHEMA_VERSION {
            return Err(SchemaError::unsupported_version(
                "latest_session_videos",
                doc.schema_version,
            ));
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::artifact_file_name;

    fn session() -> SessionId {
        SessionId::parse("20250314_092653").unwrap()
    }

    fn artifact(img: u32, prompt: u32) -> VideoArtifact {
        VideoArtifact {
            file_name: artifact_file_name(&session(), img, prompt, "hero"),
            image_index: img,
            prompt_index: prompt,
            style_tag: "hero".into(),
            source_image: None,
            s3_location: None,
        }
    }

    #[test]
    fn test_manifest_sorts_on_build() {
        // Completion order differs from index order; the manifest must not.
        let manifest =
            SessionManifest::new(session(), vec![artifact(2, 1), artifact(1, 2), artifact(1, 1)]);
        let keys: Vec<_> = manifest.artifacts.iter().map(|a| a.sort_key()).collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (2, 1)]);
    }

    #[test]
    fn test_manifest_roundtrip() {
        let manifest = SessionManifest::new(session(), vec![artifact(1, 1)]);
        let bytes = serde_json::to_vec(&manifest).unwrap();
        let parsed = SessionManifest::from_json(&bytes).unwrap();
        assert_eq!(parsed.session, session());
        assert_eq!(parsed.artifacts.len(), 1);
    }

    #[test]
    fn test_malformed_manifest() {
        assert!(matches!(
            SessionManifest::from_json(b"{\"schema_version\": true}"),
            Err(SchemaError::Malformed { .. })
        ));
    }

    #[test]
    fn test_future_version_pointer() {
        let mut pointer = LatestPointer::new(session());
        pointer.schema_version = SCHEMA_VERSION + 1;
        let bytes = serde_json::to_vec(&pointer).unwrap();
        assert!(matches!(
            LatestPointer::from_json(&bytes),
            Err(SchemaError::UnsupportedVersion { version, .. }) if version == SCHEMA_VERSION + 1
        ));
    }
}
