//! Media stager implementation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::MediaError;

/// An uploaded file buffer, before staging.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub original_name: String,
}

/// Reference to a staged file, stored on the scheduled post record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    /// Generated collision-free file name.
    pub file_name: String,
    /// Full path of the staged file.
    pub path: String,
    pub mime: String,
    pub size: u64,
    pub original_name: String,
}

/// A staged file read back into memory for publishing.
#[derive(Debug, Clone)]
pub struct LoadedMedia {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub original_name: String,
}

/// Result of loading staged media: what could be read, and what was
/// missing. The caller decides whether missing assets fail the publish.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<LoadedMedia>,
    pub missing: Vec<MediaRef>,
}

/// Writes uploaded buffers to local storage and reads them back later.
pub struct MediaStager {
    root: PathBuf,
}

impl MediaStager {
    /// Create a stager rooted at `root`. The directory is created on
    /// first stage, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory for staged files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist each uploaded buffer under a fresh name and return the
    /// references to record on the scheduled post.
    pub async fn stage(&self, files: Vec<UploadedFile>) -> Result<Vec<MediaRef>, MediaError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        fs::create_dir_all(&self.root).await?;

        let mut refs = Vec::with_capacity(files.len());
        for file in files {
            let file_name = format!("{}-{}", Uuid::new_v4(), file.original_name);
            let path = self.root.join(&file_name);
            fs::write(&path, &file.bytes).await?;

            debug!(path = %path.display(), size = file.bytes.len(), "staged media file");
            refs.push(MediaRef {
                file_name,
                path: path.to_string_lossy().into_owned(),
                mime: file.mime,
                size: file.bytes.len() as u64,
                original_name: file.original_name,
            });
        }
        Ok(refs)
    }

    /// Read previously staged files back into memory.
    ///
    /// A missing file is reported in the result, not raised: one lost
    /// asset must not crash the whole publish attempt. Genuine IO
    /// failures (permissions, disk) still propagate.
    pub async fn load(&self, refs: &[MediaRef]) -> Result<LoadReport, MediaError> {
        let mut report = LoadReport::default();
        for media_ref in refs {
            match fs::read(&media_ref.path).await {
                Ok(bytes) => report.loaded.push(LoadedMedia {
                    bytes,
                    mime: media_ref.mime.clone(),
                    original_name: media_ref.original_name.clone(),
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %media_ref.path, "staged media file missing");
                    report.missing.push(media_ref.clone());
                }
                Err(e) => return Err(MediaError::Io(e)),
            }
        }
        Ok(report)
    }

    /// Best-effort delete of each staged file. Missing files are fine;
    /// release runs on every terminal transition and must be idempotent.
    pub async fn release(&self, refs: &[MediaRef]) {
        for media_ref in refs {
            match fs::remove_file(&media_ref.path).await {
                Ok(()) => debug!(path = %media_ref.path, "released staged media"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %media_ref.path, error = %e, "failed to release staged media"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            bytes: bytes.to_vec(),
            mime: "image/png".to_string(),
            original_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn stage_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let stager = MediaStager::new(dir.path());

        let refs = stager
            .stage(vec![upload("a.png", b"aaa"), upload("b.png", b"bbbb")])
            .await
            .unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].size, 3);
        assert_eq!(refs[1].size, 4);
        // Fresh names never collide with the original name alone.
        assert_ne!(refs[0].file_name, "a.png");

        let report = stager.load(&refs).await.unwrap();
        assert_eq!(report.loaded.len(), 2);
        assert!(report.missing.is_empty());
        assert_eq!(report.loaded[0].bytes, b"aaa");
        assert_eq!(report.loaded[1].original_name, "b.png");
    }

    #[tokio::test]
    async fn stage_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("uploads").join("scheduled");
        let stager = MediaStager::new(&nested);

        let refs = stager.stage(vec![upload("a.png", b"x")]).await.unwrap();
        assert!(nested.join(&refs[0].file_name).exists());
    }

    #[tokio::test]
    async fn load_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let stager = MediaStager::new(dir.path());

        let refs = stager
            .stage(vec![upload("a.png", b"aaa"), upload("b.png", b"bbb")])
            .await
            .unwrap();
        tokio::fs::remove_file(&refs[0].path).await.unwrap();

        let report = stager.load(&refs).await.unwrap();
        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].original_name, "a.png");

        // All files gone: nothing loads, nothing errors.
        tokio::fs::remove_file(&refs[1].path).await.unwrap();
        let report = stager.load(&refs).await.unwrap();
        assert!(report.loaded.is_empty());
        assert_eq!(report.missing.len(), 2);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let stager = MediaStager::new(dir.path());

        let refs = stager.stage(vec![upload("a.png", b"aaa")]).await.unwrap();
        assert!(std::path::Path::new(&refs[0].path).exists());

        stager.release(&refs).await;
        assert!(!std::path::Path::new(&refs[0].path).exists());

        // Second release of the same refs is a quiet no-op.
        stager.release(&refs).await;
    }

    #[tokio::test]
    async fn stage_empty_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("never-created");
        let stager = MediaStager::new(&root);

        let refs = stager.stage(Vec::new()).await.unwrap();
        assert!(refs.is_empty());
        assert!(!root.exists());
    }
}
