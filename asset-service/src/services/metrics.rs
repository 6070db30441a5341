//! Metrics collection and Prometheus export.
//!
//! Installs the global recorder and provides the /metrics rendering plus
//! helpers for the cache and generation counters.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Only the first call installs a recorder; later calls are no-ops so tests
/// can share one process-wide recorder.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Failed to install Prometheus recorder"),
    }
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_cache_hit() {
    counter!("asset_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    counter!("asset_cache_misses_total").increment(1);
}

/// Record a finished pipeline run; `outcome` is `ok` or `error`.
pub fn record_generation(outcome: &'static str, duration_secs: f64) {
    counter!("asset_generations_total", "outcome" => outcome).increment(1);
    histogram!("asset_generation_duration_seconds", "outcome" => outcome).record(duration_secs);
}
