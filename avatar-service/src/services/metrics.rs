//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter and provides the /metrics endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder; `None` if installation failed.
static METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    });
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .and_then(Option::as_ref)
        .map(PrometheusHandle::render)
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count one `/convert` outcome (`success`, `rejected`, `no_image`, ...).
pub fn record_conversion(outcome: &'static str) {
    ::metrics::counter!("avatar_conversions_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_latency(seconds: f64, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    ::metrics::histogram!("avatar_upstream_duration_seconds", "status" => status).record(seconds);
}
