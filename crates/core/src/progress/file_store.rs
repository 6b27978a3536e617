//! File-backed progress store.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{ProgressError, ProgressSnapshot, ProgressStore};

/// Progress store backed by a single JSON file.
///
/// Updates go through a temp file followed by a rename, so readers see
/// either the previous snapshot or the new one, never a torn write.
///
/// The cancellation flag lives in a sibling marker file rather than in
/// the snapshot itself: the batch loop rewrites the snapshot from a
/// copy it read earlier, and a flag stored inline would be lost to
/// such a rewrite. `read` folds the marker back into the snapshot.
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "progress".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn cancel_marker_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "progress".into());
        name.push(".cancel");
        self.path.with_file_name(name)
    }

    async fn remove_if_exists(path: &Path) -> Result<(), ProgressError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_snapshot(&self, snapshot: &ProgressSnapshot) -> Result<(), ProgressError> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| ProgressError::Serialization(e.to_string()))?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

/// Derive a fresh cancellation token.
fn new_token() -> String {
    let mut hasher = Sha256::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(Utc::now().to_rfc3339().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl ProgressStore for FileProgressStore {
    async fn begin(&self, pid: u32, total: usize) -> Result<String, ProgressError> {
        if self.is_running().await {
            return Err(ProgressError::AlreadyRunning);
        }

        Self::remove_if_exists(&self.cancel_marker_path()).await?;

        let token = new_token();
        let snapshot = ProgressSnapshot {
            pid,
            cancellation_token: token.clone(),
            total_count: total,
            processed_count: 0,
            cancel_requested: false,
            started_at: Utc::now(),
            current: None,
        };
        self.write_snapshot(&snapshot).await?;

        debug!(path = %self.path.display(), pid, total, "batch run started");
        Ok(token)
    }

    async fn update(&self, snapshot: &ProgressSnapshot) -> Result<(), ProgressError> {
        self.write_snapshot(snapshot).await
    }

    async fn read(&self) -> Result<Option<ProgressSnapshot>, ProgressError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let mut snapshot: ProgressSnapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| ProgressError::Serialization(e.to_string()))?;
                if tokio::fs::try_exists(&self.cancel_marker_path())
                    .await
                    .unwrap_or(false)
                {
                    snapshot.cancel_requested = true;
                }
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_running(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    async fn request_cancel(&self, token: &str) -> Result<bool, ProgressError> {
        let Some(snapshot) = self.read().await? else {
            return Ok(false);
        };

        if snapshot.cancellation_token != token {
            return Ok(false);
        }

        tokio::fs::write(&self.cancel_marker_path(), token.as_bytes()).await?;
        debug!(path = %self.path.display(), "cancellation requested");
        Ok(true)
    }

    async fn end(&self) -> Result<(), ProgressError> {
        Self::remove_if_exists(&self.cancel_marker_path()).await?;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "batch run finalized");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{CurrentItem, ItemPhase};
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> FileProgressStore {
        FileProgressStore::new(tmp.path().join("progress.json"))
    }

    #[tokio::test]
    async fn test_begin_and_read() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        assert!(!store.is_running().await);
        let token = store.begin(1234, 3).await.unwrap();
        assert!(!token.is_empty());
        assert!(store.is_running().await);

        let snapshot = store.read().await.unwrap().unwrap();
        assert_eq!(snapshot.pid, 1234);
        assert_eq!(snapshot.total_count, 3);
        assert_eq!(snapshot.processed_count, 0);
        assert!(!snapshot.cancel_requested);
        assert_eq!(snapshot.cancellation_token, token);
    }

    #[tokio::test]
    async fn test_begin_while_running_fails() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.begin(1, 1).await.unwrap();
        let result = store.begin(2, 1).await;
        assert!(matches!(result, Err(ProgressError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let first = store.begin(1, 1).await.unwrap();
        store.end().await.unwrap();
        let second = store.begin(1, 1).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_update_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.begin(1, 2).await.unwrap();
        let mut snapshot = store.read().await.unwrap().unwrap();
        snapshot.processed_count = 1;
        snapshot.current = Some(CurrentItem {
            submission_id: "sub-1".to_string(),
            submission_file_id: "file-1".to_string(),
            tracker_id: Some("rec-1".to_string()),
            phase: ItemPhase::Submitted,
            status_label: Some("pending".to_string()),
            external_job_id: Some("ots-1".to_string()),
            error: None,
        });
        store.update(&snapshot).await.unwrap();

        let loaded = store.read().await.unwrap().unwrap();
        assert_eq!(loaded.processed_count, 1);
        let current = loaded.current.unwrap();
        assert_eq!(current.phase, ItemPhase::Submitted);
        assert_eq!(current.submission_id, "sub-1");
    }

    #[tokio::test]
    async fn test_cancel_with_matching_token() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let token = store.begin(1, 1).await.unwrap();
        assert!(store.request_cancel(&token).await.unwrap());

        let snapshot = store.read().await.unwrap().unwrap();
        assert!(snapshot.cancel_requested);
    }

    #[tokio::test]
    async fn test_cancel_with_wrong_token_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.begin(1, 1).await.unwrap();
        assert!(!store.request_cancel("wrong-token").await.unwrap());

        let snapshot = store.read().await.unwrap().unwrap();
        assert!(!snapshot.cancel_requested);
    }

    #[tokio::test]
    async fn test_cancel_survives_stale_snapshot_rewrite() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        // The batch loop reads a snapshot, then rewrites it after some
        // awaited work. A cancellation landing in between must not be
        // lost to that rewrite.
        let token = store.begin(1, 3).await.unwrap();
        let mut stale = store.read().await.unwrap().unwrap();

        assert!(store.request_cancel(&token).await.unwrap());

        stale.processed_count = 1;
        store.update(&stale).await.unwrap();

        let snapshot = store.read().await.unwrap().unwrap();
        assert_eq!(snapshot.processed_count, 1);
        assert!(snapshot.cancel_requested);
    }

    #[tokio::test]
    async fn test_cancel_marker_cleared_between_runs() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let token = store.begin(1, 1).await.unwrap();
        assert!(store.request_cancel(&token).await.unwrap());
        store.end().await.unwrap();

        store.begin(2, 1).await.unwrap();
        let snapshot = store.read().await.unwrap().unwrap();
        assert!(!snapshot.cancel_requested);
    }

    #[tokio::test]
    async fn test_cancel_without_run() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert!(!store.request_cancel("any").await.unwrap());
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.begin(1, 1).await.unwrap();
        store.end().await.unwrap();
        assert!(!store.is_running().await);

        // Ending again must not fail.
        store.end().await.unwrap();
        store.end().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.begin(1, 1).await.unwrap();
        let snapshot = store.read().await.unwrap().unwrap();
        store.update(&snapshot).await.unwrap();

        assert!(!store.temp_path().exists());
    }
}
