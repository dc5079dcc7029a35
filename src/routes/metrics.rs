//! Prometheus metrics endpoint
//!
//! Exposes relay metrics in Prometheus format for monitoring.

use axum::{http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

use crate::streaming::RelayOutcome;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "relay_requests_total",
        "Total number of proxied requests by outcome"
    );
    metrics::describe_histogram!(
        "relay_request_duration_seconds",
        "Time from request arrival until the response body was fully relayed"
    );
    metrics::describe_counter!(
        "relay_bytes_relayed_total",
        "Response bytes received from deployments"
    );
    metrics::describe_counter!(
        "relay_flush_dropped_total",
        "Timer flushes skipped because the flush queue was full"
    );
    metrics::describe_counter!(
        "relay_discovery_failures_total",
        "Deployment listings that could not be fetched"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a finished request
///
/// `status` is the deployment's status code, or the error code for requests
/// rejected before forwarding.
pub fn record_request(status: &str, model: &str, duration_secs: f64) {
    metrics::counter!("relay_requests_total", "status" => status.to_string(), "model" => model.to_string())
        .increment(1);
    metrics::histogram!("relay_request_duration_seconds", "model" => model.to_string())
        .record(duration_secs);
}

/// Record a relayed response
pub fn record_relay(status: StatusCode, model: &str, outcome: &RelayOutcome, duration_secs: f64) {
    record_request(status.as_str(), model, duration_secs);
    metrics::counter!("relay_bytes_relayed_total", "model" => model.to_string())
        .increment(outcome.bytes_received);
}
