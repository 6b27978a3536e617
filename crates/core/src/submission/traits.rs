//! Trait definitions for submission collaborators.

use async_trait::async_trait;

use crate::archive::Extraction;

use super::types::{AttachedGalley, Submission, SubmissionError, SubmissionFile};

/// Read-only access to submissions and their files.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Look up a submission by id.
    async fn get_submission(&self, id: &str) -> Result<Submission, SubmissionError>;

    /// Latest revision of a submission file.
    async fn latest_file_revision(&self, file_id: &str) -> Result<SubmissionFile, SubmissionError>;
}

/// The single write path into publication records.
///
/// Attaches the extracted XML document as the galley file and the media
/// entries as its dependent files.
#[async_trait]
pub trait GalleyAttacher: Send + Sync {
    async fn attach(
        &self,
        submission: &Submission,
        file: &SubmissionFile,
        extraction: &Extraction,
        base_name: &str,
    ) -> Result<AttachedGalley, SubmissionError>;
}
