//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Event deliveries (acks, redeliveries, dead letters)
//! - Transcoding (results, duration, probe failures)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Deliveries
// =============================================================================

/// Deliveries handled by workers, by result.
pub static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediavault_deliveries_total",
            "Total event deliveries handled by workers",
        ),
        &["result"], // "processed", "already_handled", "failed", "timed_out"
    )
    .unwrap()
});

/// Deliveries put back on the queue after a retryable failure.
pub static REDELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediavault_redeliveries_total",
        "Total deliveries re-published after a retryable failure",
    )
    .unwrap()
});

/// Deliveries dropped after exhausting attempts or failing permanently.
pub static DEAD_LETTERS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediavault_dead_letters_total",
        "Total deliveries given up on",
    )
    .unwrap()
});

/// Deliveries currently being handled.
pub static DELIVERIES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediavault_deliveries_in_flight",
        "Number of deliveries currently being handled",
    )
    .unwrap()
});

// =============================================================================
// Transcoding
// =============================================================================

/// Transcode attempts by result.
pub static TRANSCODES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediavault_transcodes_total", "Total transcode attempts"),
        &["result"], // "success", "failed", "skipped"
    )
    .unwrap()
});

/// Wall time of the encoder run.
pub static TRANSCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediavault_transcode_duration_seconds",
            "Duration of ffmpeg encodes",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &[],
    )
    .unwrap()
});

/// Probes that yielded no usable duration.
pub static PROBE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediavault_probe_failures_total",
        "Total duration probes that returned no value",
    )
    .unwrap()
});

/// All core metrics, for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(DELIVERIES_TOTAL.clone()),
        Box::new(REDELIVERIES_TOTAL.clone()),
        Box::new(DEAD_LETTERS_TOTAL.clone()),
        Box::new(DELIVERIES_IN_FLIGHT.clone()),
        Box::new(TRANSCODES_TOTAL.clone()),
        Box::new(TRANSCODE_DURATION.clone()),
        Box::new(PROBE_FAILURES_TOTAL.clone()),
    ]
}
