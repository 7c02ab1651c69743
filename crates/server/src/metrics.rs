//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the mediavault server:
//! - HTTP request metrics (latency, counts)
//! - Event ingress and queue depth
//! - Worker pool gauges (collected dynamically)
//! - Everything the core registers (deliveries, transcodes, probes)

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
            "mediavault_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediavault_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediavault_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Event Ingress
// =============================================================================

/// Upload-confirmed events received over HTTP, by result.
pub static EVENTS_RECEIVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediavault_events_received_total",
            "Upload-confirmed events received over HTTP",
        ),
        &["result"],
    )
    .unwrap()
});

/// Deliveries waiting for a worker (collected dynamically).
pub static EVENT_QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediavault_event_queue_depth",
        "Deliveries waiting for a worker",
    )
    .unwrap()
});

/// Configured worker count (collected dynamically).
pub static WORKERS: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("mediavault_workers", "Number of pool workers").unwrap());

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

    // Events
    registry
        .register(Box::new(EVENTS_RECEIVED_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(EVENT_QUEUE_DEPTH.clone()))
        .unwrap();
    registry.register(Box::new(WORKERS.clone())).unwrap();

    // Core metrics (deliveries, transcodes, probes)
    for metric in mediavault_core::metrics::all_metrics() {
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

/// Refresh gauges that are read from application state rather than updated in place.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    EVENT_QUEUE_DEPTH.set(state.publisher().queued() as i64);
    WORKERS.set(state.pool_status().workers as i64);
}
