//! Session store: durable JSON documents in the project folder.
//!
//! All documents live next to the product images:
//! `session_videos_{id}.json`, `latest_session_videos.json`,
//! `generation_report_{id}.json`, `merge_report_{id}.json`,
//! `selected_images.json` and `product_analysis_prompts.json`.
//!
//! Writes go through a temp file in the same directory followed by a
//! rename, so readers never observe a half-written document.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use adgen_models::{
    GenerationReport, ImageSelection, LatestPointer, MergeReport, PromptSet, SessionId,
    SessionManifest,
};

use crate::error::{PipelineError, PipelineResult};

const MANIFEST_PREFIX: &str = "session_videos_";
const LATEST_POINTER_FILE: &str = "latest_session_videos.json";
const SELECTION_FILE: &str = "selected_images.json";
const PROMPTS_FILE: &str = "product_analysis_prompts.json";

/// Which sessions an operation should cover.
#[derive(Debug, Clone)]
pub enum SessionFilter {
    /// The most recently completed session
    Latest,
    /// Every recorded session, oldest first
    All,
    /// One specific session
    Id(SessionId),
}

/// Store for a project folder's durable documents.
pub struct SessionStore {
    root: PathBuf,
    minted: HashSet<SessionId>,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            minted: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mint a fresh session id.
    ///
    /// Sessions minted within the same second get `_NN` suffixes. A
    /// candidate is taken if this store already minted it (manifests are
    /// only written at stage end, so recent mints are not yet on disk) or
    /// a manifest for it exists from a concurrent or earlier run.
    pub fn mint_session(&mut self) -> PipelineResult<SessionId> {
        let base = SessionId::now();
        let existing = self.list_sessions()?;

        let taken =
            |candidate: &SessionId| existing.contains(candidate) || self.minted.contains(candidate);

        let mut candidate = base.clone();
        let mut n = 1u32;
        while taken(&candidate) {
            n += 1;
            candidate = base.with_suffix(n);
        }

        self.minted.insert(candidate.clone());
        debug!("Minted session {}", candidate);
        Ok(candidate)
    }

    /// All recorded sessions, oldest first.
    pub fn list_sessions(&self) -> PipelineResult<Vec<SessionId>> {
        let mut sessions = Vec::new();

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sessions),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name
                .strip_prefix(MANIFEST_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(SessionId::parse)
            {
                sessions.push(id);
            }
        }

        sessions.sort();
        Ok(sessions)
    }

    /// Resolve a filter to concrete session ids, oldest first.
    ///
    /// `Latest` trusts the pointer file when it names a session whose
    /// manifest still exists; otherwise it falls back to the newest
    /// manifest on disk.
    pub fn resolve(&self, filter: &SessionFilter) -> PipelineResult<Vec<SessionId>> {
        match filter {
            SessionFilter::Id(id) => {
                if !self.manifest_path(id).exists() {
                    return Err(PipelineError::SessionNotFound(id.clone()));
                }
                Ok(vec![id.clone()])
            }
            SessionFilter::All => {
                let sessions = self.list_sessions()?;
                if sessions.is_empty() {
                    return Err(PipelineError::NoSessions);
                }
                Ok(sessions)
            }
            SessionFilter::Latest => {
                if let Some(id) = self.read_latest_pointer()? {
                    if self.manifest_path(&id).exists() {
                        return Ok(vec![id]);
                    }
                    warn!("Latest pointer names {} but its manifest is gone", id);
                }
                let sessions = self.list_sessions()?;
                sessions
                    .last()
                    .cloned()
                    .map(|id| vec![id])
                    .ok_or(PipelineError::NoSessions)
            }
        }
    }

    /// Load a session's manifest.
    pub fn load_manifest(&self, session: &SessionId) -> PipelineResult<SessionManifest> {
        let path = self.manifest_path(session);
        let data = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::SessionNotFound(session.clone())
            } else {
                e.into()
            }
        })?;
        Ok(SessionManifest::from_json(&data)?)
    }

    /// Write a session's manifest.
    pub fn write_manifest(&self, manifest: &SessionManifest) -> PipelineResult<PathBuf> {
        let path = self.manifest_path(&manifest.session);
        self.write_json_atomic(&path, manifest)?;
        Ok(path)
    }

    /// Overwrite the latest-session pointer. Always last in a run, so a
    /// reader following it finds the manifest already in place.
    pub fn write_latest_pointer(&self, pointer: &LatestPointer) -> PipelineResult<()> {
        self.write_json_atomic(&self.root.join(LATEST_POINTER_FILE), pointer)
    }

    /// Read the latest-session pointer, if present and valid.
    fn read_latest_pointer(&self) -> PipelineResult<Option<SessionId>> {
        let path = self.root.join(LATEST_POINTER_FILE);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match LatestPointer::from_json(&data) {
            Ok(pointer) => Ok(Some(pointer.session)),
            Err(e) => {
                warn!("Ignoring unreadable latest pointer: {}", e);
                Ok(None)
            }
        }
    }

    /// Write a generation report.
    pub fn write_generation_report(&self, report: &GenerationReport) -> PipelineResult<PathBuf> {
        let path = self
            .root
            .join(format!("generation_report_{}.json", report.session));
        self.write_json_atomic(&path, report)?;
        Ok(path)
    }

    /// Write a merge report, named by the merge run's own timestamp.
    pub fn write_merge_report(&self, report: &MergeReport) -> PipelineResult<PathBuf> {
        let path = self
            .root
            .join(format!("merge_report_{}.json", SessionId::now()));
        self.write_json_atomic(&path, report)?;
        Ok(path)
    }

    /// Write the image selection document.
    pub fn write_selection(&self, selection: &ImageSelection) -> PipelineResult<()> {
        self.write_json_atomic(&self.root.join(SELECTION_FILE), selection)
    }

    /// Load the image selection document.
    pub fn load_selection(&self) -> PipelineResult<ImageSelection> {
        let data = std::fs::read(self.root.join(SELECTION_FILE)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::missing_prerequisite(format!(
                    "{} not found; run without --skip-selection first",
                    SELECTION_FILE
                ))
            } else {
                e.into()
            }
        })?;
        Ok(ImageSelection::from_json(&data)?)
    }

    /// Write the per-image prompt document.
    pub fn write_prompts(&self, prompts: &PromptSet) -> PipelineResult<()> {
        self.write_json_atomic(&self.root.join(PROMPTS_FILE), prompts)
    }

    /// Load the per-image prompt document.
    pub fn load_prompts(&self) -> PipelineResult<PromptSet> {
        let data = std::fs::read(self.root.join(PROMPTS_FILE)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::missing_prerequisite(format!(
                    "{} not found; run without --skip-analysis first",
                    PROMPTS_FILE
                ))
            } else {
                e.into()
            }
        })?;
        Ok(PromptSet::from_json(&data)?)
    }

    /// Path of a session's manifest file.
    pub fn manifest_path(&self, session: &SessionId) -> PathBuf {
        self.root
            .join(format!("{}{}.json", MANIFEST_PREFIX, session))
    }

    /// Serialize to a sibling temp file, then rename into place.
    fn write_json_atomic<T: Serialize>(&self, path: &Path, value: &T) -> PipelineResult<()> {
        std::fs::create_dir_all(&self.root)?;
        let tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&tmp, value)?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}
