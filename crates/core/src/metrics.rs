//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Reconciler (poll cycles, live and recording set sizes, whitelist)
//! - Dispatcher (jobs dispatched and completed, busy workers)
//! - Capture jobs (capture duration, post-processing)
//! - Platform API (credential refreshes)

use once_cell::sync::Lazy;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};

// =============================================================================
// Reconciler Metrics
// =============================================================================

/// Poll cycles by listing result.
pub static POLL_CYCLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("castkeeper_poll_cycles_total", "Total reconciler poll cycles"),
        &["result"], // "online", "offline", "unauthorized", "not_found", "error"
    )
    .unwrap()
});

/// Broadcasters live in the watched category at the last poll.
pub static LIVE_BROADCASTERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "castkeeper_live_broadcasters",
        "Broadcasters live in the watched category and language",
    )
    .unwrap()
});

/// Broadcasters with a dispatched capture job.
pub static RECORDING_BROADCASTERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "castkeeper_recording_broadcasters",
        "Broadcasters with a dispatched, unfinished capture job",
    )
    .unwrap()
});

/// Whitelist entries by state.
pub static WHITELIST_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("castkeeper_whitelist_entries", "Whitelist entries"),
        &["state"], // "enabled", "disabled"
    )
    .unwrap()
});

// =============================================================================
// Dispatcher Metrics
// =============================================================================

/// Capture jobs submitted to the dispatcher.
pub static JOBS_DISPATCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "castkeeper_jobs_dispatched_total",
        "Total capture jobs dispatched",
    )
    .unwrap()
});

/// Capture jobs finished, by outcome.
pub static JOBS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "castkeeper_jobs_completed_total",
            "Total capture jobs completed",
        ),
        &["outcome"], // "done", "failed"
    )
    .unwrap()
});

/// Workers currently running a capture job.
pub static WORKERS_BUSY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "castkeeper_workers_busy",
        "Worker slots currently running a capture job",
    )
    .unwrap()
});

// =============================================================================
// Capture Metrics
// =============================================================================

/// Duration of capture tool invocations.
pub static CAPTURE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "castkeeper_capture_duration_seconds",
            "Duration of capture tool invocations",
        )
        .buckets(vec![
            60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0, 28800.0,
        ]),
        &["result"], // "output", "no_output", "error"
    )
    .unwrap()
});

/// Post-processing results by processor.
pub static POSTPROCESS_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "castkeeper_postprocess_total",
            "Total post-processing attempts",
        ),
        &["processor", "result"],
    )
    .unwrap()
});

// =============================================================================
// Platform API Metrics
// =============================================================================

/// Access token refreshes.
pub static CREDENTIAL_REFRESHES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "castkeeper_credential_refreshes_total",
        "Total access token refreshes",
    )
    .unwrap()
});

/// Register all core metrics with a registry.
pub fn register_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(POLL_CYCLES.clone()))?;
    registry.register(Box::new(LIVE_BROADCASTERS.clone()))?;
    registry.register(Box::new(RECORDING_BROADCASTERS.clone()))?;
    registry.register(Box::new(WHITELIST_ENTRIES.clone()))?;
    registry.register(Box::new(JOBS_DISPATCHED.clone()))?;
    registry.register(Box::new(JOBS_COMPLETED.clone()))?;
    registry.register(Box::new(WORKERS_BUSY.clone()))?;
    registry.register(Box::new(CAPTURE_DURATION.clone()))?;
    registry.register(Box::new(POSTPROCESS_RESULTS.clone()))?;
    registry.register(Box::new(CREDENTIAL_REFRESHES.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();

        POLL_CYCLES.with_label_values(&["online"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|mf| mf.get_name().to_string())
            .collect();
        assert!(names.contains(&"castkeeper_poll_cycles_total".to_string()));

        // Registering twice in the same registry is rejected.
        assert!(register_metrics(&registry).is_err());
    }
}
