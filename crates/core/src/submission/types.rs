//! Types for submission lookups and galley attachment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from submission collaborators.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The submission or file does not exist. Batch items hitting this
    /// are skipped, not failed.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Attach failed: {0}")]
    AttachFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A manuscript submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub journal_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// One revision of a submission file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionFile {
    pub id: String,
    pub submission_id: String,
    pub revision: u32,
    /// Absolute path of the file content.
    pub path: PathBuf,
    pub original_name: String,
}

/// Result of attaching a conversion result to a publication record.
#[derive(Debug, Clone)]
pub struct AttachedGalley {
    /// Base name shared by the XML and its dependents.
    pub base_name: String,
    /// Where the XML document landed.
    pub xml_path: PathBuf,
    /// Where the dependent media files landed.
    pub media_paths: Vec<PathBuf>,
}

/// Base name for an attached galley, suffixed with the attach time so
/// repeated conversions never collide.
pub fn galley_base_name(now: DateTime<Utc>) -> String {
    format!("document__{}", now.format("%Y-%m-%d_%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_galley_base_name_format() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(galley_base_name(ts), "document__2026-03-14_15-09-26");
    }

    #[test]
    fn test_submission_file_serialization() {
        let file = SubmissionFile {
            id: "file-1".to_string(),
            submission_id: "sub-1".to_string(),
            revision: 3,
            path: PathBuf::from("/spool/sub-1/files/file-1/r3.docx"),
            original_name: "manuscript.docx".to_string(),
        };
        let json = serde_json::to_string(&file).unwrap();
        let parsed: SubmissionFile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.revision, 3);
        assert_eq!(parsed.original_name, "manuscript.docx");
    }
}
