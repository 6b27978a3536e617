//! Types for the batch orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthError;
use crate::progress::ProgressError;

/// Run-level errors. Per-item failures are contained inside the run
/// and surface through the progress snapshot instead.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Caller lacks the role batch runs require.
    #[error("Not authorized to run batch conversions: {0}")]
    Unauthorized(#[from] AuthError),

    /// Another run holds the progress snapshot.
    #[error("A batch run is already in progress")]
    AlreadyRunning,

    /// Progress store error.
    #[error("Progress store error: {0}")]
    Progress(ProgressError),
}

impl From<ProgressError> for BatchError {
    fn from(e: ProgressError) -> Self {
        match e {
            ProgressError::AlreadyRunning => BatchError::AlreadyRunning,
            other => BatchError::Progress(other),
        }
    }
}

/// Errors from a single interactive conversion trigger.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Tracker error: {0}")]
    Tracker(#[from] crate::tracker::TrackerError),

    #[error("Conversion service error: {0}")]
    Ots(#[from] crate::ots::OtsError),

    #[error("Submission error: {0}")]
    Submission(String),
}

/// One submission file to convert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub submission_id: String,
    pub submission_file_id: String,
}

/// A request to convert a set of submission files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
}

impl BatchRequest {
    pub fn new(items: Vec<BatchItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Summary of a finished batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// True when the run stopped early on a cancellation request.
    pub cancelled: bool,
}

/// Result of an interactive conversion trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredJob {
    /// Tracker id for later status lookups.
    pub tracker_id: String,
    /// Job id assigned by the conversion service.
    pub job_id: String,
}
