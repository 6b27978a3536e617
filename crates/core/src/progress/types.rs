//! Types for durable batch progress.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the progress store.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// A run is already recorded as active.
    #[error("A batch run is already in progress")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Phase of the per-item state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPhase {
    Queued,
    JobRegistered,
    Submitted,
    Polling,
    Completed,
    Extracted,
    Attached,
    Succeeded,
    Failed,
}

impl ItemPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemPhase::Queued => "queued",
            ItemPhase::JobRegistered => "job_registered",
            ItemPhase::Submitted => "submitted",
            ItemPhase::Polling => "polling",
            ItemPhase::Completed => "completed",
            ItemPhase::Extracted => "extracted",
            ItemPhase::Attached => "attached",
            ItemPhase::Succeeded => "succeeded",
            ItemPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemPhase::Succeeded | ItemPhase::Failed)
    }
}

/// The item the batch loop is currently working on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentItem {
    pub submission_id: String,
    pub submission_file_id: String,
    /// Tracker id, set once the job record exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<String>,
    pub phase: ItemPhase,
    /// Last status label reported by the conversion service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_job_id: Option<String>,
    /// Error message when the item failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CurrentItem {
    pub fn queued(submission_id: impl Into<String>, submission_file_id: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
            submission_file_id: submission_file_id.into(),
            tracker_id: None,
            phase: ItemPhase::Queued,
            status_label: None,
            external_job_id: None,
            error: None,
        }
    }
}

/// Durable snapshot of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Process id of the worker that owns the run.
    pub pid: u32,
    /// Token a caller must present to cancel the run.
    pub cancellation_token: String,
    /// Total number of items in the run.
    pub total_count: usize,
    /// Items attempted so far (success, failure, and skips all count).
    pub processed_count: usize,
    /// Set when a caller has requested cancellation.
    pub cancel_requested: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentItem>,
}

/// Trait for durable batch progress storage.
///
/// `begin` doubles as the mutual-exclusion gate: only one run can hold
/// a snapshot at a time.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Start a run. Fails with `AlreadyRunning` when a snapshot exists.
    /// Returns the cancellation token for the new run.
    async fn begin(&self, pid: u32, total: usize) -> Result<String, ProgressError>;

    /// Replace the snapshot. Readers never observe a partial write,
    /// and a cancellation recorded concurrently stays visible even
    /// when `snapshot` predates it.
    async fn update(&self, snapshot: &ProgressSnapshot) -> Result<(), ProgressError>;

    /// Read the current snapshot, if a run is active.
    async fn read(&self) -> Result<Option<ProgressSnapshot>, ProgressError>;

    /// Whether a run is currently recorded as active.
    async fn is_running(&self) -> bool;

    /// Request cancellation. Returns true when the token matched and
    /// the flag was set.
    async fn request_cancel(&self, token: &str) -> Result<bool, ProgressError>;

    /// Finalize the run and remove the snapshot. Idempotent.
    async fn end(&self) -> Result<(), ProgressError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_phase_terminal() {
        assert!(ItemPhase::Succeeded.is_terminal());
        assert!(ItemPhase::Failed.is_terminal());
        assert!(!ItemPhase::Queued.is_terminal());
        assert!(!ItemPhase::Polling.is_terminal());
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = ProgressSnapshot {
            pid: 1234,
            cancellation_token: "tok".to_string(),
            total_count: 5,
            processed_count: 2,
            cancel_requested: false,
            started_at: Utc::now(),
            current: Some(CurrentItem {
                submission_id: "sub-1".to_string(),
                submission_file_id: "file-1".to_string(),
                tracker_id: Some("rec-1".to_string()),
                phase: ItemPhase::Polling,
                status_label: Some("processing".to_string()),
                external_job_id: Some("ots-9".to_string()),
                error: None,
            }),
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: ProgressSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.pid, 1234);
        assert_eq!(parsed.total_count, 5);
        assert_eq!(parsed.processed_count, 2);
        let current = parsed.current.unwrap();
        assert_eq!(current.phase, ItemPhase::Polling);
        assert_eq!(current.external_job_id, Some("ots-9".to_string()));
    }

    #[test]
    fn test_current_item_queued() {
        let item = CurrentItem::queued("sub-1", "file-1");
        assert_eq!(item.phase, ItemPhase::Queued);
        assert!(item.tracker_id.is_none());
        assert!(item.error.is_none());
    }
}
