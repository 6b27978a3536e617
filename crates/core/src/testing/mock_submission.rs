//! Mock submission collaborators for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::archive::Extraction;
use crate::submission::{
    AttachedGalley, GalleyAttacher, Submission, SubmissionError, SubmissionFile,
    SubmissionRepository,
};

/// In-memory submission repository.
pub struct MockSubmissionRepository {
    submissions: Arc<RwLock<HashMap<String, Submission>>>,
    files: Arc<RwLock<HashMap<String, SubmissionFile>>>,
}

impl Default for MockSubmissionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSubmissionRepository {
    pub fn new() -> Self {
        Self {
            submissions: Arc::new(RwLock::new(HashMap::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_submission(&self, submission: Submission) {
        self.submissions
            .write()
            .await
            .insert(submission.id.clone(), submission);
    }

    pub async fn add_file(&self, file: SubmissionFile) {
        self.files.write().await.insert(file.id.clone(), file);
    }
}

#[async_trait]
impl SubmissionRepository for MockSubmissionRepository {
    async fn get_submission(&self, id: &str) -> Result<Submission, SubmissionError> {
        self.submissions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SubmissionError::NotFound(format!("submission {}", id)))
    }

    async fn latest_file_revision(&self, file_id: &str) -> Result<SubmissionFile, SubmissionError> {
        self.files
            .read()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| SubmissionError::NotFound(format!("file {}", file_id)))
    }
}

/// A recorded attach call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAttach {
    pub submission_id: String,
    pub file_id: String,
    pub base_name: String,
    pub xml_name: Option<String>,
    pub media_count: usize,
}

/// Galley attacher that records calls instead of writing files.
pub struct MockGalleyAttacher {
    attached: Arc<RwLock<Vec<RecordedAttach>>>,
    next_error: Arc<RwLock<Option<SubmissionError>>>,
}

impl Default for MockGalleyAttacher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGalleyAttacher {
    pub fn new() -> Self {
        Self {
            attached: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Get all recorded attach calls.
    pub async fn attached(&self) -> Vec<RecordedAttach> {
        self.attached.read().await.clone()
    }

    /// Fail the next attach with the given error.
    pub async fn set_next_error(&self, error: SubmissionError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl GalleyAttacher for MockGalleyAttacher {
    async fn attach(
        &self,
        submission: &Submission,
        file: &SubmissionFile,
        extraction: &Extraction,
        base_name: &str,
    ) -> Result<AttachedGalley, SubmissionError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let xml_name = extraction.primary_document().map(|e| e.name.clone());
        let media_count = extraction.media_entries().len();

        self.attached.write().await.push(RecordedAttach {
            submission_id: submission.id.clone(),
            file_id: file.id.clone(),
            base_name: base_name.to_string(),
            xml_name,
            media_count,
        });

        Ok(AttachedGalley {
            base_name: base_name.to_string(),
            xml_path: PathBuf::from(format!("/mock/galleys/{}.xml", base_name)),
            media_paths: Vec::new(),
        })
    }
}
