//! Mock conversion client for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use zip::write::SimpleFileOptions;

use crate::ots::{ConversionClient, JobStatus, OtsError, TargetOperation};

/// A recorded submission for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmit {
    pub document: PathBuf,
    pub target: TargetOperation,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the ConversionClient trait.
///
/// Provides controllable behavior for testing:
/// - Track submitted documents for assertions
/// - Script the status sequence a job reports
/// - Simulate failures
pub struct MockConversionClient {
    /// Recorded submit calls.
    submitted: Arc<RwLock<Vec<RecordedSubmit>>>,
    /// Queued job ids handed out by submit.
    queued_job_ids: Arc<RwLock<VecDeque<String>>>,
    /// Scripted status sequences by job id. The last status repeats.
    statuses: Arc<RwLock<HashMap<String, VecDeque<JobStatus>>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<OtsError>>>,
    /// Entries written into fetched archives.
    archive_entries: Arc<RwLock<Vec<(String, Vec<u8>)>>>,
    /// Counter for generated job ids.
    job_counter: Arc<RwLock<u32>>,
}

impl Default for MockConversionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConversionClient {
    pub fn new() -> Self {
        Self {
            submitted: Arc::new(RwLock::new(Vec::new())),
            queued_job_ids: Arc::new(RwLock::new(VecDeque::new())),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            archive_entries: Arc::new(RwLock::new(vec![
                ("document.xml".to_string(), b"<article/>".to_vec()),
                ("figure1.png".to_string(), b"\x89PNG".to_vec()),
            ])),
            job_counter: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded submit calls.
    pub async fn submitted(&self) -> Vec<RecordedSubmit> {
        self.submitted.read().await.clone()
    }

    /// Queue the job id the next submit will return.
    pub async fn queue_job_id(&self, job_id: impl Into<String>) {
        self.queued_job_ids.write().await.push_back(job_id.into());
    }

    /// Script the statuses a job reports, in order. The last status
    /// repeats once the sequence is exhausted.
    pub async fn script_statuses(&self, job_id: impl Into<String>, statuses: Vec<JobStatus>) {
        self.statuses
            .write()
            .await
            .insert(job_id.into(), statuses.into());
    }

    /// Fail the next operation with the given error.
    pub async fn set_next_error(&self, error: OtsError) {
        *self.next_error.write().await = Some(error);
    }

    /// Replace the entries written into fetched archives.
    pub async fn set_archive_entries(&self, entries: Vec<(String, Vec<u8>)>) {
        *self.archive_entries.write().await = entries;
    }

    async fn take_error(&self) -> Option<OtsError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl ConversionClient for MockConversionClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, document: &Path, target: TargetOperation) -> Result<String, OtsError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        self.submitted.write().await.push(RecordedSubmit {
            document: document.to_path_buf(),
            target,
            timestamp: Utc::now(),
        });

        let job_id = match self.queued_job_ids.write().await.pop_front() {
            Some(id) => id,
            None => {
                let mut counter = self.job_counter.write().await;
                *counter += 1;
                format!("mock-job-{}", counter)
            }
        };
        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, OtsError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let mut statuses = self.statuses.write().await;
        match statuses.get_mut(job_id) {
            Some(sequence) => {
                let status = if sequence.len() > 1 {
                    sequence.pop_front().unwrap()
                } else {
                    // Repeat the last status forever.
                    *sequence.front().unwrap_or(&JobStatus::Completed)
                };
                Ok(status)
            }
            // Unscripted jobs complete immediately.
            None => Ok(JobStatus::Completed),
        }
    }

    async fn fetch_archive(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf, OtsError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let entries = self.archive_entries.read().await.clone();
        let archive_path = dest_dir.join(format!("{}.zip", job_id));

        let file = std::fs::File::create(&archive_path)
            .map_err(|e| OtsError::DownloadFailed(e.to_string()))?;
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in &entries {
            writer
                .start_file(name, SimpleFileOptions::default())
                .map_err(|e| OtsError::DownloadFailed(e.to_string()))?;
            writer
                .write_all(data)
                .map_err(|e| OtsError::DownloadFailed(e.to_string()))?;
        }
        writer
            .finish()
            .map_err(|e| OtsError::DownloadFailed(e.to_string()))?;

        Ok(archive_path)
    }
}
