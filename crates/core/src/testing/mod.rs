//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the external service
//! traits, allowing batch lifecycle testing without a real conversion
//! service or journal installation.
//!
//! # Example
//!
//! ```rust,ignore
//! use galleyforge_core::testing::{MockConversionClient, MockSubmissionRepository};
//!
//! let client = MockConversionClient::new();
//! client.queue_job_id("job-1").await;
//! client.script_statuses("job-1", vec![JobStatus::Processing, JobStatus::Completed]).await;
//!
//! // Use in a BatchOrchestrator...
//! ```

mod mock_conversion_client;
mod mock_submission;

pub use mock_conversion_client::{MockConversionClient, RecordedSubmit};
pub use mock_submission::{MockGalleyAttacher, MockSubmissionRepository, RecordedAttach};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::submission::{Submission, SubmissionFile};
    use std::path::Path;

    /// Create a test submission with reasonable defaults.
    pub fn submission(id: &str) -> Submission {
        Submission {
            id: id.to_string(),
            journal_id: "journal-1".to_string(),
            title: Some(format!("Study {}", id)),
        }
    }

    /// Create a test submission file pointing at a real document on disk.
    pub fn submission_file(id: &str, submission_id: &str, dir: &Path) -> SubmissionFile {
        let path = dir.join(format!("{}.docx", id));
        std::fs::write(&path, b"mock manuscript bytes").unwrap();
        SubmissionFile {
            id: id.to_string(),
            submission_id: submission_id.to_string(),
            revision: 1,
            path,
            original_name: format!("{}.docx", id),
        }
    }
}
