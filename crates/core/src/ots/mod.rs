//! Conversion service abstraction.
//!
//! This module provides a `ConversionClient` trait for submitting
//! documents to an XML typesetting service and retrieving results.

mod http;
mod types;

pub use http::HttpOtsClient;
pub use types::*;

use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;

/// Poll a job until the service reports a terminal status.
///
/// The observer is notified after every poll, including the terminal
/// one. Transient errors keep the loop alive; permanent errors and the
/// overall timeout abort it.
pub async fn poll_until_terminal(
    client: &dyn ConversionClient,
    job_id: &str,
    interval: Duration,
    timeout: Duration,
    observer: &dyn StatusObserver,
) -> Result<JobStatus, OtsError> {
    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match client.status(job_id).await {
            Ok(status) => {
                let update = StatusUpdate {
                    job_id: job_id.to_string(),
                    status,
                    polled_at: Utc::now(),
                    attempt,
                };
                observer.on_status(&update).await;

                if status.is_terminal() {
                    return Ok(status);
                }
            }
            Err(OtsError::Transient(reason)) => {
                tracing::warn!(job_id = %job_id, attempt, %reason, "transient status poll failure");
            }
            Err(e) => return Err(e),
        }

        if Instant::now() + interval > deadline {
            return Err(OtsError::Timeout);
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConversionClient;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingObserver {
        calls: AtomicU32,
        last_status: std::sync::Mutex<Option<JobStatus>>,
    }

    impl CountingObserver {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                last_status: std::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl StatusObserver for CountingObserver {
        async fn on_status(&self, update: &StatusUpdate) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_status.lock().unwrap() = Some(update.status);
        }
    }

    #[tokio::test]
    async fn test_poll_until_completed() {
        let client = MockConversionClient::new();
        client
            .script_statuses(
                "job-1",
                vec![JobStatus::Pending, JobStatus::Processing, JobStatus::Completed],
            )
            .await;

        let observer = CountingObserver::new();
        let status = poll_until_terminal(
            &client,
            "job-1",
            Duration::from_millis(1),
            Duration::from_secs(5),
            &observer,
        )
        .await
        .unwrap();

        assert_eq!(status, JobStatus::Completed);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *observer.last_status.lock().unwrap(),
            Some(JobStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_poll_observer_sees_terminal_failure() {
        let client = MockConversionClient::new();
        client
            .script_statuses("job-2", vec![JobStatus::Processing, JobStatus::Failed])
            .await;

        let observer = CountingObserver::new();
        let status = poll_until_terminal(
            &client,
            "job-2",
            Duration::from_millis(1),
            Duration::from_secs(5),
            &observer,
        )
        .await
        .unwrap();

        assert_eq!(status, JobStatus::Failed);
        // The final failing poll is observed too.
        assert_eq!(
            *observer.last_status.lock().unwrap(),
            Some(JobStatus::Failed)
        );
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let client = MockConversionClient::new();
        client
            .script_statuses("job-3", vec![JobStatus::Processing])
            .await;

        let observer = CountingObserver::new();
        let result = poll_until_terminal(
            &client,
            "job-3",
            Duration::from_millis(5),
            Duration::from_millis(20),
            &observer,
        )
        .await;

        assert!(matches!(result, Err(OtsError::Timeout)));
    }

    #[tokio::test]
    async fn test_poll_propagates_permanent_error() {
        let client = MockConversionClient::new();
        client
            .set_next_error(OtsError::Permanent("unknown job".to_string()))
            .await;

        let observer = CountingObserver::new();
        let result = poll_until_terminal(
            &client,
            "nope",
            Duration::from_millis(1),
            Duration::from_secs(5),
            &observer,
        )
        .await;

        assert!(matches!(result, Err(OtsError::Permanent(_))));
        assert_eq!(observer.calls.load(Ordering::SeqCst), 0);
    }
}
