//! Types for conversion service operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when talking to the conversion service.
#[derive(Debug, Error)]
pub enum OtsError {
    /// The service rejected the document or was unreachable at submit time.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// A status poll failed for a retryable reason (network, 5xx).
    #[error("Transient service error: {0}")]
    Transient(String),

    /// The service does not know the job, or the request is malformed.
    #[error("Permanent service error: {0}")]
    Permanent(String),

    /// The result archive could not be retrieved or arrived empty.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timeout")]
    Timeout,
}

/// Status codes reported by the conversion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Unknown,
}

impl JobStatus {
    /// Map a numeric status code from the service API.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => JobStatus::Pending,
            1 => JobStatus::Processing,
            2 => JobStatus::Completed,
            3 => JobStatus::Failed,
            _ => JobStatus::Unknown,
        }
    }

    /// Human-readable label stored alongside job records.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        }
    }

    /// The service will not change this status anymore.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobStatus::Failed)
    }
}

/// What the service should produce from the submitted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetOperation {
    /// Convert the manuscript to JATS XML.
    XmlConversion,
    /// Generate display galleys (PDF/ePub) from existing XML.
    GalleyGenerate,
}

impl TargetOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOperation::XmlConversion => "xml-conversion",
            TargetOperation::GalleyGenerate => "galley-generate",
        }
    }
}

/// Immutable view of one status poll, handed to observers.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// External job id being polled.
    pub job_id: String,
    /// Status reported by the service.
    pub status: JobStatus,
    /// When the poll happened.
    pub polled_at: DateTime<Utc>,
    /// 1-based poll attempt counter.
    pub attempt: u32,
}

/// Receives a status update after every poll, including the terminal one.
/// Observers own their side effects (persisting labels, progress writes);
/// the polling loop never shares mutable state with them.
#[async_trait]
pub trait StatusObserver: Send + Sync {
    async fn on_status(&self, update: &StatusUpdate);
}

/// No-op observer for callers that only need the final status.
pub struct NullStatusObserver;

#[async_trait]
impl StatusObserver for NullStatusObserver {
    async fn on_status(&self, _update: &StatusUpdate) {}
}

/// Trait for conversion service backends.
#[async_trait]
pub trait ConversionClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Upload a document and start a conversion job.
    /// Returns the external job id.
    async fn submit(&self, document: &Path, target: TargetOperation) -> Result<String, OtsError>;

    /// Query the current status of a job.
    async fn status(&self, job_id: &str) -> Result<JobStatus, OtsError>;

    /// Download the result archive of a completed job into `dest_dir`.
    /// Returns the path of the downloaded archive.
    async fn fetch_archive(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf, OtsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_code() {
        assert_eq!(JobStatus::from_code(0), JobStatus::Pending);
        assert_eq!(JobStatus::from_code(1), JobStatus::Processing);
        assert_eq!(JobStatus::from_code(2), JobStatus::Completed);
        assert_eq!(JobStatus::from_code(3), JobStatus::Failed);
        assert_eq!(JobStatus::from_code(42), JobStatus::Unknown);
        assert_eq!(JobStatus::from_code(-1), JobStatus::Unknown);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(JobStatus::Pending.label(), "pending");
        assert_eq!(JobStatus::Processing.label(), "processing");
        assert_eq!(JobStatus::Completed.label(), "completed");
        assert_eq!(JobStatus::Failed.label(), "failed");
        assert_eq!(JobStatus::Unknown.label(), "unknown");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Unknown.is_terminal());

        assert!(JobStatus::Failed.is_failed());
        assert!(!JobStatus::Completed.is_failed());
    }

    #[test]
    fn test_target_operation_as_str() {
        assert_eq!(TargetOperation::XmlConversion.as_str(), "xml-conversion");
        assert_eq!(TargetOperation::GalleyGenerate.as_str(), "galley-generate");
    }

    #[test]
    fn test_target_operation_serialization() {
        assert_eq!(
            serde_json::to_string(&TargetOperation::XmlConversion).unwrap(),
            "\"xml-conversion\""
        );
        let parsed: TargetOperation = serde_json::from_str("\"galley-generate\"").unwrap();
        assert_eq!(parsed, TargetOperation::GalleyGenerate);
    }

    #[test]
    fn test_error_display() {
        let err = OtsError::SubmissionFailed("bad format".to_string());
        assert_eq!(err.to_string(), "Submission failed: bad format");

        let err = OtsError::Permanent("unknown job 9".to_string());
        assert_eq!(err.to_string(), "Permanent service error: unknown job 9");
    }
}
