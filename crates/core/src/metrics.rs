//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Batch runs (started, finished, cancellations)
//! - Items (attempted, by result)
//! - Conversion service calls

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Batch run metrics
// =============================================================================

/// Batch runs started total.
pub static BATCH_RUNS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "galleyforge_batch_runs_started_total",
        "Total batch runs started",
    )
    .unwrap()
});

/// Batch runs finished by outcome.
pub static BATCH_RUNS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "galleyforge_batch_runs_finished_total",
            "Total batch runs finished",
        ),
        &["outcome"], // "completed", "cancelled"
    )
    .unwrap()
});

/// Batch run duration in seconds.
pub static BATCH_RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "galleyforge_batch_run_duration_seconds",
            "Duration of batch runs",
        )
        .buckets(vec![
            1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Item metrics
// =============================================================================

/// Batch items processed by result.
pub static BATCH_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("galleyforge_batch_items_total", "Total batch items processed"),
        &["result"], // "succeeded", "failed", "skipped"
    )
    .unwrap()
});

/// Per-item conversion duration in seconds.
pub static ITEM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "galleyforge_item_duration_seconds",
            "Duration of single item conversions",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Conversion service metrics
// =============================================================================

/// Conversion service requests total.
pub static OTS_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "galleyforge_ots_requests_total",
            "Total conversion service requests",
        ),
        &["operation", "status"], // operation: "submit", "status", "retrieve"; status: "success", "error"
    )
    .unwrap()
});

/// Status polls per job.
pub static OTS_POLLS_PER_JOB: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "galleyforge_ots_polls_per_job",
            "Number of status polls until a job reached a terminal state",
        )
        .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Batch runs
        Box::new(BATCH_RUNS_STARTED.clone()),
        Box::new(BATCH_RUNS_FINISHED.clone()),
        Box::new(BATCH_RUN_DURATION.clone()),
        // Items
        Box::new(BATCH_ITEMS.clone()),
        Box::new(ITEM_DURATION.clone()),
        // Conversion service
        Box::new(OTS_REQUESTS.clone()),
        Box::new(OTS_POLLS_PER_JOB.clone()),
    ]
}
