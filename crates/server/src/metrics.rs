//! Prometheus metrics for observability.
//!
//! The server registers its own HTTP metrics plus every metric the core
//! exports (swap jobs, fetches, provisioning, pipeline runs). Gauges that
//! mirror live state are refreshed right before each scrape.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use crate::state::AppState;

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
            "swapd_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0, 1800.0, 3600.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("swapd_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "swapd_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Live state (collected dynamically)
// =============================================================================

/// Swap jobs by current stage.
pub static JOBS_BY_STAGE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("swapd_jobs_by_stage", "Swap jobs currently in each stage"),
        &["stage"],
    )
    .unwrap()
});

/// Pipeline runs holding a permit.
pub static PIPELINE_POOL_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("swapd_pipeline_pool_active", "Number of active pipeline runs").unwrap()
});

/// Pipeline runs waiting for a permit.
pub static PIPELINE_POOL_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("swapd_pipeline_pool_queued", "Number of queued pipeline runs").unwrap()
});

/// Dependency readiness (1 = ready, 0 = not confirmed).
pub static DEPENDENCY_READY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "swapd_dependency_ready",
            "Whether a dependency is confirmed present",
        ),
        &["dependency"],
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

    // Live state
    registry.register(Box::new(JOBS_BY_STAGE.clone())).unwrap();
    registry
        .register(Box::new(PIPELINE_POOL_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(PIPELINE_POOL_QUEUED.clone()))
        .unwrap();
    registry
        .register(Box::new(DEPENDENCY_READY.clone()))
        .unwrap();

    // Core metrics (jobs, fetches, provisioning, pipeline)
    for metric in faceswap_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges from current application state before a scrape.
pub fn collect_dynamic_metrics(state: &AppState) {
    let status = state.orchestrator().status();
    for (stage, count) in [
        ("pending", status.pending_count),
        ("provisioning", status.provisioning_count),
        ("fetching", status.fetching_count),
        ("running", status.running_count),
    ] {
        JOBS_BY_STAGE.with_label_values(&[stage]).set(count as i64);
    }

    let pool = state.orchestrator().pipeline_status();
    PIPELINE_POOL_ACTIVE.set(pool.active_jobs as i64);
    PIPELINE_POOL_QUEUED.set(pool.queued_jobs as i64);

    for dependency in state.provisioner().snapshot().dependencies {
        DEPENDENCY_READY
            .with_label_values(&[&dependency.name])
            .set(i64::from(dependency.status.is_ready()));
    }
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1");
    result.to_string()
}
