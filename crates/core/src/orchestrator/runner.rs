//! Sequential batch conversion loop.
//!
//! One item at a time: look up the submission file, register a job
//! record, submit to the conversion service, poll until terminal,
//! download and unpack the result archive, attach the galley. A failed
//! item never aborts the run; the loop records the failure and moves
//! on. Cancellation is cooperative and takes effect at item boundaries.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::archive::ArchiveExtractor;
use crate::auth::{Identity, Role};
use crate::metrics;
use crate::ots::{
    poll_until_terminal, ConversionClient, StatusObserver, StatusUpdate, TargetOperation,
};
use crate::progress::{CurrentItem, ItemPhase, ProgressSnapshot, ProgressStore};
use crate::submission::{
    galley_base_name, GalleyAttacher, Submission, SubmissionError, SubmissionFile,
    SubmissionRepository,
};
use crate::tracker::{JobRecord, JobTracker};

use super::config::BatchConfig;
use super::types::{BatchError, BatchItem, BatchOutcome, BatchRequest, TriggerError, TriggeredJob};

/// How a single item ended.
enum ItemResult {
    Succeeded,
    Failed(String),
    Skipped(String),
}

/// Drives batch conversion runs and interactive conversion triggers.
pub struct BatchOrchestrator {
    config: BatchConfig,
    client: Arc<dyn ConversionClient>,
    extractor: ArchiveExtractor,
    tracker: Arc<dyn JobTracker>,
    progress: Arc<dyn ProgressStore>,
    repository: Arc<dyn SubmissionRepository>,
    attacher: Arc<dyn GalleyAttacher>,
}

impl BatchOrchestrator {
    pub fn new(
        config: BatchConfig,
        client: Arc<dyn ConversionClient>,
        tracker: Arc<dyn JobTracker>,
        progress: Arc<dyn ProgressStore>,
        repository: Arc<dyn SubmissionRepository>,
        attacher: Arc<dyn GalleyAttacher>,
    ) -> Self {
        Self {
            config,
            client,
            extractor: ArchiveExtractor::new(),
            tracker,
            progress,
            repository,
            attacher,
        }
    }

    pub fn progress(&self) -> &Arc<dyn ProgressStore> {
        &self.progress
    }

    /// Run a batch conversion over the requested items.
    ///
    /// Requires the manager role. Only one run can be active at a time;
    /// a second call fails with `AlreadyRunning` until the first run's
    /// snapshot is gone.
    pub async fn run(
        &self,
        identity: &Identity,
        request: BatchRequest,
    ) -> Result<BatchOutcome, BatchError> {
        identity.require_role(Role::Manager)?;

        let total = request.len();
        self.progress.begin(std::process::id(), total).await?;

        metrics::BATCH_RUNS_STARTED.inc();
        let run_start = Instant::now();
        info!(total, user = %identity.user_id, "batch run started");

        let mut outcome = BatchOutcome {
            total,
            ..Default::default()
        };

        for item in &request.items {
            let cancel_requested = match self.progress.read().await {
                Ok(Some(snapshot)) => snapshot.cancel_requested,
                Ok(None) => false,
                Err(e) => {
                    warn!(error = %e, "failed to read progress snapshot");
                    false
                }
            };
            if cancel_requested {
                info!(
                    processed = outcome.succeeded + outcome.failed + outcome.skipped,
                    total,
                    "cancellation requested, stopping at item boundary"
                );
                outcome.cancelled = true;
                break;
            }

            let current = CurrentItem::queued(&item.submission_id, &item.submission_file_id);
            update_snapshot(self.progress.as_ref(), |snapshot| {
                snapshot.current = Some(current);
            })
            .await;

            let item_start = Instant::now();
            let result = self.process_item(identity, item).await;
            let elapsed = item_start.elapsed().as_secs_f64();

            match &result {
                ItemResult::Succeeded => {
                    outcome.succeeded += 1;
                    metrics::BATCH_ITEMS.with_label_values(&["succeeded"]).inc();
                    metrics::ITEM_DURATION
                        .with_label_values(&["succeeded"])
                        .observe(elapsed);
                    update_current(self.progress.as_ref(), |current| {
                        current.phase = ItemPhase::Succeeded;
                    })
                    .await;
                }
                ItemResult::Failed(reason) => {
                    outcome.failed += 1;
                    metrics::BATCH_ITEMS.with_label_values(&["failed"]).inc();
                    metrics::ITEM_DURATION
                        .with_label_values(&["failed"])
                        .observe(elapsed);
                    warn!(
                        submission_id = %item.submission_id,
                        file_id = %item.submission_file_id,
                        %reason,
                        "batch item failed"
                    );
                    let reason = reason.clone();
                    update_current(self.progress.as_ref(), move |current| {
                        current.phase = ItemPhase::Failed;
                        current.error = Some(reason);
                    })
                    .await;
                }
                ItemResult::Skipped(what) => {
                    outcome.skipped += 1;
                    metrics::BATCH_ITEMS.with_label_values(&["skipped"]).inc();
                    info!(
                        submission_id = %item.submission_id,
                        file_id = %item.submission_file_id,
                        %what,
                        "batch item skipped"
                    );
                }
            }

            update_snapshot(self.progress.as_ref(), |snapshot| {
                snapshot.processed_count += 1;
            })
            .await;

            if matches!(result, ItemResult::Failed(_)) && self.config.failure_pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.failure_pause_ms)).await;
            }
        }

        if let Err(e) = self.progress.end().await {
            warn!(error = %e, "failed to finalize progress snapshot");
        }

        let label = if outcome.cancelled {
            "cancelled"
        } else {
            "completed"
        };
        metrics::BATCH_RUNS_FINISHED.with_label_values(&[label]).inc();
        metrics::BATCH_RUN_DURATION
            .with_label_values(&[label])
            .observe(run_start.elapsed().as_secs_f64());
        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            skipped = outcome.skipped,
            cancelled = outcome.cancelled,
            "batch run finished"
        );

        Ok(outcome)
    }

    /// Submit a single file for conversion without waiting for the
    /// result. Returns the tracker id callers poll for status.
    pub async fn trigger_conversion(
        &self,
        identity: &Identity,
        submission_id: &str,
        submission_file_id: &str,
        target: TargetOperation,
    ) -> Result<TriggeredJob, TriggerError> {
        let submission = self
            .repository
            .get_submission(submission_id)
            .await
            .map_err(map_submission_error)?;
        let file = self
            .repository
            .latest_file_revision(submission_file_id)
            .await
            .map_err(map_submission_error)?;

        let record = self
            .tracker
            .register(&submission.journal_id, &identity.user_id, &file.id)?;

        let job_id = self.client.submit(&file.path, target).await?;
        self.tracker.bind_external_job(&record.id, &job_id)?;
        self.tracker.update_status(&record.id, "submitted")?;

        info!(
            tracker_id = %record.id,
            %job_id,
            submission_id = %submission.id,
            target = target.as_str(),
            "conversion triggered"
        );

        Ok(TriggeredJob {
            tracker_id: record.id,
            job_id,
        })
    }

    async fn process_item(&self, identity: &Identity, item: &BatchItem) -> ItemResult {
        let submission = match self.repository.get_submission(&item.submission_id).await {
            Ok(s) => s,
            Err(SubmissionError::NotFound(what)) => return ItemResult::Skipped(what),
            Err(e) => return ItemResult::Failed(e.to_string()),
        };
        let file = match self
            .repository
            .latest_file_revision(&item.submission_file_id)
            .await
        {
            Ok(f) => f,
            Err(SubmissionError::NotFound(what)) => return ItemResult::Skipped(what),
            Err(e) => return ItemResult::Failed(e.to_string()),
        };

        let record = match self
            .tracker
            .register(&submission.journal_id, &identity.user_id, &file.id)
        {
            Ok(r) => r,
            Err(e) => return ItemResult::Failed(e.to_string()),
        };
        let tracker_id = record.id.clone();
        update_current(self.progress.as_ref(), move |current| {
            current.tracker_id = Some(tracker_id);
            current.phase = ItemPhase::JobRegistered;
        })
        .await;

        let work_dir = self.config.work_dir.join(&record.id);
        if let Err(e) = tokio::fs::create_dir_all(&work_dir).await {
            return ItemResult::Failed(format!("failed to create work dir: {}", e));
        }

        let result = self
            .convert_item(&submission, &file, &record, &work_dir)
            .await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            warn!(dir = %work_dir.display(), error = %e, "failed to remove work dir");
        }

        result
    }

    /// Everything between job registration and galley attachment.
    /// Scratch files live under `work_dir`, which the caller removes.
    async fn convert_item(
        &self,
        submission: &Submission,
        file: &SubmissionFile,
        record: &JobRecord,
        work_dir: &std::path::Path,
    ) -> ItemResult {
        let job_id = match self
            .client
            .submit(&file.path, self.config.batch_target)
            .await
        {
            Ok(id) => id,
            Err(e) => return ItemResult::Failed(e.to_string()),
        };

        if let Err(e) = self.tracker.bind_external_job(&record.id, &job_id) {
            return ItemResult::Failed(e.to_string());
        }
        if let Err(e) = self.tracker.update_status(&record.id, "submitted") {
            warn!(tracker_id = %record.id, error = %e, "failed to persist status label");
        }
        let job_id_for_snapshot = job_id.clone();
        update_current(self.progress.as_ref(), move |current| {
            current.phase = ItemPhase::Submitted;
            current.external_job_id = Some(job_id_for_snapshot);
        })
        .await;

        update_current(self.progress.as_ref(), |current| {
            current.phase = ItemPhase::Polling;
        })
        .await;

        let observer = TrackerStatusObserver {
            tracker: Arc::clone(&self.tracker),
            progress: Arc::clone(&self.progress),
            tracker_id: record.id.clone(),
            polls: AtomicU32::new(0),
        };
        let final_status = match poll_until_terminal(
            self.client.as_ref(),
            &job_id,
            Duration::from_millis(self.config.poll_interval_ms),
            Duration::from_millis(self.config.poll_timeout_ms),
            &observer,
        )
        .await
        {
            Ok(status) => status,
            Err(e) => return ItemResult::Failed(e.to_string()),
        };
        metrics::OTS_POLLS_PER_JOB
            .with_label_values(&[])
            .observe(observer.polls.load(Ordering::SeqCst) as f64);

        if final_status.is_failed() {
            return ItemResult::Failed("conversion service reported failure".to_string());
        }
        update_current(self.progress.as_ref(), |current| {
            current.phase = ItemPhase::Completed;
        })
        .await;

        let archive_path = match self.client.fetch_archive(&job_id, work_dir).await {
            Ok(path) => path,
            Err(e) => return ItemResult::Failed(e.to_string()),
        };

        let extraction = match self.extractor.extract(&archive_path) {
            Ok(extraction) => extraction,
            Err(e) => return ItemResult::Failed(e.to_string()),
        };
        update_current(self.progress.as_ref(), |current| {
            current.phase = ItemPhase::Extracted;
        })
        .await;

        let base_name = galley_base_name(chrono::Utc::now());
        if let Err(e) = self
            .attacher
            .attach(submission, file, &extraction, &base_name)
            .await
        {
            return ItemResult::Failed(e.to_string());
        }

        if let Err(e) = extraction.dispose() {
            warn!(error = %e, "failed to remove extraction dir");
        }
        if let Err(e) = self.tracker.update_status(&record.id, "attached") {
            warn!(tracker_id = %record.id, error = %e, "failed to persist status label");
        }
        update_current(self.progress.as_ref(), |current| {
            current.phase = ItemPhase::Attached;
        })
        .await;

        ItemResult::Succeeded
    }
}

fn map_submission_error(e: SubmissionError) -> TriggerError {
    match e {
        SubmissionError::NotFound(what) => TriggerError::NotFound(what),
        other => TriggerError::Submission(other.to_string()),
    }
}

/// Persists polled status labels into the job record and mirrors them
/// into the progress snapshot.
struct TrackerStatusObserver {
    tracker: Arc<dyn JobTracker>,
    progress: Arc<dyn ProgressStore>,
    tracker_id: String,
    polls: AtomicU32,
}

#[async_trait::async_trait]
impl StatusObserver for TrackerStatusObserver {
    async fn on_status(&self, update: &StatusUpdate) {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let label = update.status.label();

        if let Err(e) = self.tracker.update_status(&self.tracker_id, label) {
            warn!(tracker_id = %self.tracker_id, error = %e, "failed to persist status label");
        }
        update_current(self.progress.as_ref(), |current| {
            current.status_label = Some(label.to_string());
        })
        .await;
    }
}

/// Re-read, mutate, and rewrite the snapshot. The store keeps the
/// cancellation flag out of band, so this rewrite cannot clear a
/// concurrently requested cancel.
async fn update_snapshot<F>(progress: &dyn ProgressStore, mutate: F)
where
    F: FnOnce(&mut ProgressSnapshot) + Send,
{
    match progress.read().await {
        Ok(Some(mut snapshot)) => {
            mutate(&mut snapshot);
            if let Err(e) = progress.update(&snapshot).await {
                warn!(error = %e, "failed to write progress snapshot");
            }
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "failed to read progress snapshot");
        }
    }
}

async fn update_current<F>(progress: &dyn ProgressStore, mutate: F)
where
    F: FnOnce(&mut CurrentItem) + Send,
{
    update_snapshot(progress, |snapshot| {
        if let Some(current) = snapshot.current.as_mut() {
            mutate(current);
        }
    })
    .await;
}
