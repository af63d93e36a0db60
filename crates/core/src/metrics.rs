//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Swap jobs (results, duration)
//! - Asset fetches (per provider)
//! - Provisioning actions (per dependency)
//! - Pipeline runs

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Swap jobs
// =============================================================================

/// Swap jobs total by result.
pub static SWAP_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("swapd_swap_jobs_total", "Total swap jobs"),
        &["result"], // "success", or the error kind
    )
    .unwrap()
});

/// Swap job duration in seconds.
pub static SWAP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("swapd_swap_duration_seconds", "Duration of swap jobs")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

/// Swap jobs currently in flight.
pub static SWAP_JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("swapd_swap_jobs_in_flight", "Swap jobs currently running").unwrap()
});

// =============================================================================
// Fetcher
// =============================================================================

/// Fetches total by provider and result.
pub static FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("swapd_fetches_total", "Total asset fetches"),
        &["provider", "result"], // result: "success", "failed", "invalid_reference"
    )
    .unwrap()
});

/// Bytes fetched by provider.
pub static FETCHED_BYTES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("swapd_fetched_bytes_total", "Total bytes fetched"),
        &["provider"],
    )
    .unwrap()
});

// =============================================================================
// Provisioner
// =============================================================================

/// Provisioning actions by dependency and result.
pub static PROVISION_ACTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("swapd_provision_actions_total", "Total provisioning actions"),
        &["dependency", "result"], // "cached", "present", "installed", "failed"
    )
    .unwrap()
});

// =============================================================================
// Pipeline
// =============================================================================

/// Pipeline runs by result.
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("swapd_pipeline_runs_total", "Total pipeline runs"),
        &["result"], // "success", "failed", "timeout", "spawn_error"
    )
    .unwrap()
});

/// Duration of successful pipeline runs in seconds.
pub static PIPELINE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "swapd_pipeline_duration_seconds",
            "Duration of successful pipeline runs",
        )
        .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

/// All core metrics, for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Swap jobs
        Box::new(SWAP_JOBS.clone()),
        Box::new(SWAP_DURATION.clone()),
        Box::new(SWAP_JOBS_IN_FLIGHT.clone()),
        // Fetcher
        Box::new(FETCHES.clone()),
        Box::new(FETCHED_BYTES.clone()),
        // Provisioner
        Box::new(PROVISION_ACTIONS.clone()),
        // Pipeline
        Box::new(PIPELINE_RUNS.clone()),
        Box::new(PIPELINE_DURATION.clone()),
    ]
}
