//! JSON file implementation of the state persistence seam.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use weft_core::error::{Result, WeftError};
use weft_core::{StateData, StorageBackend};

/// Persists the state tree as pretty-printed JSON.
///
/// Writes go to a temporary sibling file first and are moved into place with
/// a rename, so a crash mid-write never leaves a half-written primary. The
/// previous snapshot is kept as a `.bak` sibling and is used as a fallback
/// when the primary is missing or fails to parse.
pub struct FileStorageBackend {
    path: PathBuf,
}

impl FileStorageBackend {
    /// Creates a backend writing to `path`.
    ///
    /// The parent directory is created on the first save if it does not
    /// exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, "bak")
    }

    fn tmp_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, "tmp")
    }

    async fn read_snapshot(&self, path: &Path) -> Result<Option<StateData>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(WeftError::storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let state = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }
}

#[async_trait]
impl StorageBackend for FileStorageBackend {
    async fn save_state(&self, state: &StateData) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                WeftError::storage(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, &json).await.map_err(|e| {
            WeftError::storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;

        // Keep the previous snapshot around as the fallback.
        if fs::metadata(&self.path).await.is_ok()
            && let Err(e) = fs::rename(&self.path, self.backup_path()).await
        {
            tracing::warn!("Could not rotate state backup: {}", e);
        }

        fs::rename(&tmp, &self.path).await.map_err(|e| {
            WeftError::storage(format!(
                "Failed to move snapshot into place at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!("State snapshot saved to {}", self.path.display());
        Ok(())
    }

    async fn load_state(&self) -> Result<Option<StateData>> {
        match self.read_snapshot(&self.path).await {
            Ok(Some(state)) => return Ok(Some(state)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "Primary snapshot at {} unreadable ({}), trying backup",
                    self.path.display(),
                    e
                );
            }
        }
        self.read_snapshot(&self.backup_path()).await
    }
}

/// `state.json` -> `state.json.bak` style sibling names, so all variants of
/// one snapshot sort together in the directory.
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use weft_core::state::SessionState;

    fn sample_state() -> StateData {
        let mut state = StateData::default();
        state.sessions.insert(
            "user-42".to_string(),
            SessionState {
                id: "user-42".to_string(),
                user_id: Some(42),
                created_at: "2026-08-30T00:00:00Z".to_string(),
                updated_at: "2026-08-30T00:00:00Z".to_string(),
                views: vec!["v1".to_string()],
                history: Vec::new(),
                data: Map::new(),
            },
        );
        state
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStorageBackend::new(dir.path().join("state.json"));

        backend.save_state(&sample_state()).await.unwrap();
        let loaded = backend.load_state().await.unwrap().unwrap();

        assert_eq!(loaded.sessions["user-42"].views, vec!["v1"]);
    }

    #[tokio::test]
    async fn test_load_without_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStorageBackend::new(dir.path().join("missing.json"));
        assert!(backend.load_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_primary_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let backend = FileStorageBackend::new(&path);

        // Two saves so a backup of the first snapshot exists.
        backend.save_state(&sample_state()).await.unwrap();
        backend.save_state(&sample_state()).await.unwrap();
        fs::write(&path, b"{ not json").await.unwrap();

        let loaded = backend.load_state().await.unwrap().unwrap();
        assert!(loaded.sessions.contains_key("user-42"));
    }

    #[tokio::test]
    async fn test_save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStorageBackend::new(dir.path().join("nested/deeper/state.json"));
        backend.save_state(&sample_state()).await.unwrap();
        assert!(backend.load_state().await.unwrap().is_some());
    }
}
