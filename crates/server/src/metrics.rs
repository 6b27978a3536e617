//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Galleyforge server:
//! - HTTP request metrics (latency, counts, errors)
//! - Authentication failures
//! - Batch run status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "galleyforge_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("galleyforge_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "galleyforge_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "galleyforge_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Batch Run Metrics (collected dynamically)
// =============================================================================

/// Whether a batch run is active (1) or not (0).
pub static BATCH_RUN_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "galleyforge_batch_run_active",
        "Whether a batch run is currently active",
    )
    .unwrap()
});

/// Items processed in the active batch run.
pub static BATCH_RUN_PROCESSED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "galleyforge_batch_run_processed",
        "Items processed so far in the active batch run",
    )
    .unwrap()
});

/// Total items in the active batch run.
pub static BATCH_RUN_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "galleyforge_batch_run_total_items",
        "Total items in the active batch run",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Batch run
    registry
        .register(Box::new(BATCH_RUN_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(BATCH_RUN_PROCESSED.clone()))
        .unwrap();
    registry.register(Box::new(BATCH_RUN_TOTAL.clone())).unwrap();

    // Core metrics (batch loop, conversion service)
    for metric in galleyforge_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding metrics to update gauges with values from the
/// progress snapshot.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    match state.progress().read().await {
        Ok(Some(snapshot)) => {
            BATCH_RUN_ACTIVE.set(1);
            BATCH_RUN_PROCESSED.set(snapshot.processed_count as i64);
            BATCH_RUN_TOTAL.set(snapshot.total_count as i64);
        }
        _ => {
            BATCH_RUN_ACTIVE.set(0);
            BATCH_RUN_PROCESSED.set(0);
            BATCH_RUN_TOTAL.set(0);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/jobs/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/jobs/{id}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/jobs/12345";
        assert_eq!(normalize_path(path), "/api/v1/jobs/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("galleyforge_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Touch all metrics to ensure they appear in output
        // (Prometheus only outputs metrics that have been accessed)
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        BATCH_RUN_ACTIVE.set(0);
        BATCH_RUN_PROCESSED.set(0);
        BATCH_RUN_TOTAL.set(0);

        let output = encode_metrics();

        assert!(output.contains("galleyforge_http_request_duration_seconds"));
        assert!(output.contains("galleyforge_http_requests_total"));
        assert!(output.contains("galleyforge_http_requests_in_flight"));
        assert!(output.contains("galleyforge_batch_run_active"));
        assert!(output.contains("galleyforge_batch_run_processed"));
    }
}
