//! Conversion job tracking trait and types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for job tracking operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No record with the given tracker id.
    #[error("Job record not found: {0}")]
    NotFound(String),

    /// The record is already bound to a different external job.
    #[error("Job record {id} already bound to external job {existing}")]
    AlreadyBound { id: String, existing: String },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Durable record of one conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Tracker id (uuid), assigned at registration.
    pub id: String,
    /// Journal the submission belongs to.
    pub journal_id: String,
    /// User who requested the conversion.
    pub created_by: String,
    /// Submission file the job converts.
    pub submission_file_id: String,
    /// Id assigned by the conversion service. Write-once.
    pub external_job_id: Option<String>,
    /// Last observed status label.
    pub status_label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trait for job tracking backends.
///
/// Records survive process restarts; any process with access to the
/// backing store can resolve a tracker id.
pub trait JobTracker: Send + Sync {
    /// Create a new record and return it. The record starts unbound
    /// with status "registered".
    fn register(
        &self,
        journal_id: &str,
        created_by: &str,
        submission_file_id: &str,
    ) -> Result<JobRecord, TrackerError>;

    /// Bind the external job id. Binding is write-once: rebinding to a
    /// different id fails with `AlreadyBound`, rebinding to the same id
    /// is a no-op.
    fn bind_external_job(&self, id: &str, external_job_id: &str) -> Result<(), TrackerError>;

    /// Update the status label.
    fn update_status(&self, id: &str, label: &str) -> Result<(), TrackerError>;

    /// Look up a record by tracker id.
    fn lookup(&self, id: &str) -> Result<JobRecord, TrackerError>;
}
