//! Native strategy: recordings become uniquely named files in a dedicated
//! cache subdirectory, deleted again on disposal.

use crate::error::{PlaybackError, Result};
use crate::playback::resource::{Platform, ResourceBackend};
use crate::utils::{now_timestamp_millis, sanitize_file_component};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const APP_CACHE_DIR: &str = "voicemail-playback";
pub const DEFAULT_CACHE_SUBDIR: &str = "voicemail_audio";

const RECORDING_FILE_PREFIX: &str = "vm_";

#[derive(Debug, Clone)]
pub struct NativeFileBackend {
    dir: PathBuf,
}

impl NativeFileBackend {
    /// Use `dir` as the recording cache. It is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<platform cache dir>/voicemail-playback/<subdir>`.
    pub fn in_platform_cache(subdir: &str) -> Result<Self> {
        let base = dirs::cache_dir()
            .ok_or_else(|| PlaybackError::resource("no platform cache directory"))?;
        Ok(Self::new(
            base.join(APP_CACHE_DIR)
                .join(sanitize_file_component(subdir)),
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn fresh_file_name(extension: &str) -> String {
        let unique = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{RECORDING_FILE_PREFIX}{}_{}.{}",
            now_timestamp_millis(),
            &unique[..8],
            sanitize_file_component(extension)
        )
    }

    /// Remove recordings left behind by an earlier run. Only call this while
    /// no session is live.
    pub async fn purge_orphans(&self) -> usize {
        let Ok(mut read_dir) = tokio::fs::read_dir(&self.dir).await else {
            return 0;
        };

        let mut removed = 0usize;
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let path = entry.path();
            let is_recording = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(RECORDING_FILE_PREFIX));
            if !is_recording {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) => warn!(path = %path.display(), %err, "failed to purge cached recording"),
            }
        }
        if removed > 0 {
            info!(removed, dir = %self.dir.display(), "purged orphaned recordings");
        }
        removed
    }
}

#[async_trait]
impl ResourceBackend for NativeFileBackend {
    fn platform(&self) -> Platform {
        Platform::Native
    }

    async fn write(&self, bytes: &[u8], extension: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            PlaybackError::resource(format!(
                "failed to create cache dir {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.dir.join(Self::fresh_file_name(extension));
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            PlaybackError::resource(format!("failed to write {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), len = bytes.len(), "wrote recording");
        Ok(path)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path).await.map_err(|e| {
            PlaybackError::resource(format!("failed to delete {}: {e}", path.display()))
        })
    }

    async fn create_url(&self, _bytes: &[u8], _mime: &str) -> Result<String> {
        Err(PlaybackError::resource(
            "object URLs are not available on native targets",
        ))
    }

    async fn revoke_url(&self, _url: &str) -> Result<()> {
        Err(PlaybackError::resource(
            "object URLs are not available on native targets",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_creates_missing_subdirectory() {
        let temp = TempDir::new().unwrap();
        let backend = NativeFileBackend::new(temp.path().join("nested").join("audio"));

        let path = backend.write(b"RIFF", "wav").await.unwrap();

        assert!(path.starts_with(backend.dir()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("wav"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"RIFF");
    }

    #[tokio::test]
    async fn consecutive_writes_never_collide() {
        let temp = TempDir::new().unwrap();
        let backend = NativeFileBackend::new(temp.path());

        let first = backend.write(b"one", "wav").await.unwrap();
        let second = backend.write(b"two", "wav").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(tokio::fs::read(&first).await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn delete_removes_file_and_reports_missing() {
        let temp = TempDir::new().unwrap();
        let backend = NativeFileBackend::new(temp.path());
        let path = backend.write(b"RIFF", "wav").await.unwrap();

        backend.delete(&path).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(
            backend.delete(&path).await,
            Err(PlaybackError::ResourceCreation(_))
        ));
    }

    #[tokio::test]
    async fn object_urls_are_unsupported() {
        let backend = NativeFileBackend::new("/nonexistent");
        assert!(backend.create_url(b"x", "audio/wav").await.is_err());
    }

    #[tokio::test]
    async fn purge_only_touches_recordings() {
        let temp = TempDir::new().unwrap();
        let backend = NativeFileBackend::new(temp.path());
        backend.write(b"a", "wav").await.unwrap();
        backend.write(b"b", "mp3").await.unwrap();
        let keep = temp.path().join("notes.txt");
        tokio::fs::write(&keep, b"keep").await.unwrap();

        assert_eq!(backend.purge_orphans().await, 2);
        assert!(keep.exists());
        assert_eq!(backend.purge_orphans().await, 0);
    }
}
