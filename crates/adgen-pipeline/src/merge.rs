//! Merge selector: pick which generated clips to combine, and do it.
//!
//! Sources come from session manifests, in session order then
//! (image index, prompt index) order within each session. Manifest entries
//! whose backing file has been deleted are skipped, not fatal. Folders
//! predating session tracking fall back to a name-pattern scan of the
//! output directory.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use adgen_media::{merge_videos, MergeOptions};
use adgen_models::{MergeReport, SessionId};

use crate::config::output_dir;
use crate::error::{PipelineError, PipelineResult};
use crate::session::{SessionFilter, SessionStore};

/// What to merge and how.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub filter: SessionFilter,
    pub transition: bool,
    pub transition_duration: f64,
}

/// The resolved inputs for one merge run.
#[derive(Debug)]
pub struct MergeSelection {
    /// Session the merge is scoped to, when exactly one
    pub session: Option<SessionId>,
    /// Existing source files, in merge order
    pub sources: Vec<PathBuf>,
    /// Manifest entries whose file was missing
    pub skipped_missing: Vec<String>,
}

/// Resolve a merge request to concrete source files.
pub fn select_for_merge(
    store: &SessionStore,
    folder: &Path,
    filter: &SessionFilter,
) -> PipelineResult<MergeSelection> {
    let out_dir = output_dir(folder);

    let sessions = match store.resolve(filter) {
        Ok(sessions) => sessions,
        // No session files at all: fall back to scanning for video files
        // named by the artifact convention.
        Err(PipelineError::NoSessions) => {
            let sources = scan_output_dir(&out_dir, "video_")?;
            if sources.is_empty() {
                return Err(PipelineError::NoArtifactsFound);
            }
            warn!(
                "No session manifests; merging {} videos found by name pattern",
                sources.len()
            );
            return Ok(MergeSelection {
                session: None,
                sources,
                skipped_missing: Vec::new(),
            });
        }
        // A named session whose manifest is gone may still have its clips
        // on disk under the artifact convention, which embeds the id.
        Err(PipelineError::SessionNotFound(session)) => {
            let sources = scan_output_dir(&out_dir, &format!("video_{}_", session))?;
            if sources.is_empty() {
                return Err(PipelineError::SessionNotFound(session));
            }
            warn!(
                "No manifest for session {}; merging {} videos found by name pattern",
                session,
                sources.len()
            );
            return Ok(MergeSelection {
                session: Some(session),
                sources,
                skipped_missing: Vec::new(),
            });
        }
        Err(e) => return Err(e),
    };

    let mut sources = Vec::new();
    let mut skipped_missing = Vec::new();

    for session in &sessions {
        let manifest = store.load_manifest(session)?;
        for artifact in &manifest.artifacts {
            let path = out_dir.join(&artifact.file_name);
            if path.exists() {
                sources.push(path);
            } else {
                warn!("Manifest entry {} has no backing file", artifact.file_name);
                skipped_missing.push(artifact.file_name.clone());
            }
        }
    }

    if sources.is_empty() {
        return Err(PipelineError::NoArtifactsFound);
    }

    Ok(MergeSelection {
        session: (sessions.len() == 1).then(|| sessions[0].clone()),
        sources,
        skipped_missing,
    })
}

/// Run a merge end to end and write its report.
pub async fn run_merge(
    store: &SessionStore,
    folder: &Path,
    request: &MergeRequest,
) -> PipelineResult<MergeReport> {
    let selection = select_for_merge(store, folder, &request.filter)?;

    let output_name = match &selection.session {
        Some(session) => format!("merged_{}.mp4", session),
        None => format!("merged_{}.mp4", SessionId::now()),
    };
    let output_path = output_dir(folder).join(&output_name);

    info!(
        "Merging {} clips into {} ({} skipped)",
        selection.sources.len(),
        output_name,
        selection.skipped_missing.len()
    );

    let options = MergeOptions {
        transition: request.transition,
        transition_duration: request.transition_duration,
        ..MergeOptions::default()
    };
    merge_videos(&selection.sources, &output_path, &options).await?;

    let report = MergeReport::new(
        selection.session,
        selection
            .sources
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            })
            .collect(),
        selection.skipped_missing,
        output_name,
        request.transition,
    );
    store.write_merge_report(&report)?;
    Ok(report)
}

/// Scan the output directory for artifact-named videos, sorted by name.
///
/// Artifact names embed the session id and zero-padded indices, so the
/// lexicographic order is session order then index order. Passing a prefix
/// of `video_{session}_` narrows the scan to one session.
fn scan_output_dir(out_dir: &Path, name_prefix: &str) -> PipelineResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(out_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut sources: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(name_prefix) && n.ends_with(".mp4"))
                .unwrap_or(false)
        })
        .collect();

    sources.sort();
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgen_models::{artifact_file_name, SessionManifest, VideoArtifact};
    use tempfile::tempdir;

    fn session(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    fn artifact(s: &SessionId, img: u32, prompt: u32) -> VideoArtifact {
        VideoArtifact {
            file_name: artifact_file_name(s, img, prompt, "hero"),
            image_index: img,
            prompt_index: prompt,
            style_tag: "hero".into(),
            source_image: None,
            s3_location: None,
        }
    }

    fn touch(out_dir: &Path, name: &str) {
        std::fs::create_dir_all(out_dir).unwrap();
        std::fs::write(out_dir.join(name), b"x").unwrap();
    }

    fn file_names(selection: &MergeSelection) -> Vec<String> {
        selection
            .sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_single_session_index_order() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let s = session("20250314_092653");
        // Manifest construction re-sorts, so feed it out of order.
        let manifest =
            SessionManifest::new(s.clone(), vec![artifact(&s, 2, 1), artifact(&s, 1, 2), artifact(&s, 1, 1)]);
        store.write_manifest(&manifest).unwrap();

        let out_dir = output_dir(dir.path());
        for a in &manifest.artifacts {
            touch(&out_dir, &a.file_name);
        }

        let selection =
            select_for_merge(&store, dir.path(), &SessionFilter::Id(s.clone())).unwrap();
        assert_eq!(selection.session, Some(s.clone()));
        assert_eq!(
            file_names(&selection),
            vec![
                artifact_file_name(&s, 1, 1, "hero"),
                artifact_file_name(&s, 1, 2, "hero"),
                artifact_file_name(&s, 2, 1, "hero"),
            ]
        );
    }

    #[test]
    fn test_all_sessions_in_session_order() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let s1 = session("20250313_090000");
        let s2 = session("20250314_090000");
        let out_dir = output_dir(dir.path());

        // Write the newer session's manifest first; order must not care.
        for s in [&s2, &s1] {
            let manifest = SessionManifest::new(s.clone(), vec![artifact(s, 1, 1)]);
            store.write_manifest(&manifest).unwrap();
            touch(&out_dir, &artifact_file_name(s, 1, 1, "hero"));
        }

        let selection = select_for_merge(&store, dir.path(), &SessionFilter::All).unwrap();
        assert_eq!(selection.session, None);
        assert_eq!(
            file_names(&selection),
            vec![
                artifact_file_name(&s1, 1, 1, "hero"),
                artifact_file_name(&s2, 1, 1, "hero"),
            ]
        );
    }

    #[test]
    fn test_missing_files_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let s = session("20250314_092653");
        let manifest =
            SessionManifest::new(s.clone(), vec![artifact(&s, 1, 1), artifact(&s, 1, 2)]);
        store.write_manifest(&manifest).unwrap();

        // Only the second clip survived on disk.
        touch(&output_dir(dir.path()), &artifact_file_name(&s, 1, 2, "hero"));

        let selection = select_for_merge(&store, dir.path(), &SessionFilter::Id(s.clone())).unwrap();
        assert_eq!(file_names(&selection), vec![artifact_file_name(&s, 1, 2, "hero")]);
        assert_eq!(
            selection.skipped_missing,
            vec![artifact_file_name(&s, 1, 1, "hero")]
        );
    }

    #[test]
    fn test_all_files_missing_is_no_artifacts() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let s = session("20250314_092653");
        let manifest = SessionManifest::new(s.clone(), vec![artifact(&s, 1, 1)]);
        store.write_manifest(&manifest).unwrap();

        assert!(matches!(
            select_for_merge(&store, dir.path(), &SessionFilter::Id(s)),
            Err(PipelineError::NoArtifactsFound)
        ));
    }

    #[test]
    fn test_fallback_scan_without_manifests() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let out_dir = output_dir(dir.path());
        touch(&out_dir, "video_20250314_092653_02_01_hero.mp4");
        touch(&out_dir, "video_20250314_092653_01_01_hero.mp4");
        touch(&out_dir, "merged_20250314_100000.mp4");

        let selection = select_for_merge(&store, dir.path(), &SessionFilter::All).unwrap();
        assert_eq!(selection.session, None);
        assert_eq!(
            file_names(&selection),
            vec![
                "video_20250314_092653_01_01_hero.mp4",
                "video_20250314_092653_02_01_hero.mp4",
            ]
        );
    }

    #[test]
    fn test_fallback_scan_for_session_without_manifest() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let out_dir = output_dir(dir.path());
        // Clips from two sessions on disk, manifests long gone.
        touch(&out_dir, "video_20250314_092653_01_01_hero.mp4");
        touch(&out_dir, "video_20250314_092653_02_01_hero.mp4");
        touch(&out_dir, "video_20250313_090000_01_01_hero.mp4");

        let s = session("20250314_092653");
        let selection =
            select_for_merge(&store, dir.path(), &SessionFilter::Id(s.clone())).unwrap();
        assert_eq!(selection.session, Some(s));
        assert_eq!(
            file_names(&selection),
            vec![
                "video_20250314_092653_01_01_hero.mp4",
                "video_20250314_092653_02_01_hero.mp4",
            ]
        );

        // A session with neither manifest nor clips stays not-found.
        let absent = session("20250101_000000");
        assert!(matches!(
            select_for_merge(&store, dir.path(), &SessionFilter::Id(absent)),
            Err(PipelineError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_empty_folder_is_no_artifacts() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(matches!(
            select_for_merge(&store, dir.path(), &SessionFilter::Latest),
            Err(PipelineError::NoArtifactsFound)
        ));
    }
}
