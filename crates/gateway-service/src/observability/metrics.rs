//! Metrics definitions for the gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gateway_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `operation`: bounded by code (`get_context`, `free_busy`, ...)
//! - `outcome`: bounded by dispatcher/owner outcome enums

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Owner-side work is expected to be short; queue wait shows contention.
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_dispatch".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 5.000,
                30.000,
            ],
        )
        .map_err(|e| format!("Failed to set dispatch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `gateway_http_requests_total`, `gateway_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures framework-level responses too (400 JSON rejections, 404, 405).
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gateway_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gateway_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/mcp/getContext" => "/mcp/getContext",
        "/mcp/getAvailability" => "/mcp/getAvailability",
        "/mcp/createMeeting" => "/mcp/createMeeting",
        "/mcp/health" => "/mcp/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Dispatcher Metrics
// ============================================================================

/// Record one caller-side submission, from `submit` to result.
///
/// Metric: `gateway_dispatch_total`, `gateway_dispatch_duration_seconds`
/// Labels: `operation`, `outcome` (success, unavailable, timeout,
/// execution_failed)
pub fn record_dispatch(operation: &'static str, outcome: &'static str, duration: Duration) {
    counter!("gateway_dispatch_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);

    histogram!("gateway_dispatch_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// Record one item executed (or skipped) on the owner thread.
///
/// Metric: `gateway_dispatch_queue_wait_seconds`,
/// `gateway_dispatch_execution_seconds`
/// Labels: `operation`, `outcome` (completed, failed, panicked, abandoned)
pub fn record_owner_execution(
    operation: &'static str,
    outcome: &'static str,
    queue_wait: Duration,
    execution: Duration,
) {
    histogram!("gateway_dispatch_queue_wait_seconds",
        "operation" => operation
    )
    .record(queue_wait.as_secs_f64());

    histogram!("gateway_dispatch_execution_seconds",
        "operation" => operation,
        "outcome" => outcome
    )
    .record(execution.as_secs_f64());
}

/// Set the current owner queue depth.
///
/// Metric: `gateway_dispatch_queue_depth`
#[allow(clippy::cast_precision_loss)]
pub fn set_dispatch_queue_depth(depth: usize) {
    gauge!("gateway_dispatch_queue_depth").set(depth as f64);
}

// ============================================================================
// Slot Engine Metrics
// ============================================================================

/// Record one availability computation.
///
/// Metric: `gateway_slot_windows_considered_total`,
/// `gateway_slot_candidates_total`
pub fn record_slot_computation(windows_considered: usize, candidates: usize) {
    counter!("gateway_slot_windows_considered_total")
        .increment(u64::try_from(windows_considered).unwrap_or(u64::MAX));
    counter!("gateway_slot_candidates_total")
        .increment(u64::try_from(candidates).unwrap_or(u64::MAX));
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record an error returned to a client.
///
/// Metric: `gateway_errors_total`
/// Labels: `error_type`, `status_code`
pub fn record_error(error_type: &'static str, status_code: u16) {
    counter!("gateway_errors_total",
        "error_type" => error_type,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
