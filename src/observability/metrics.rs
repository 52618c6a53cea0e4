//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (request volume, latency, error classes)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method and status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `http_rate_limited_total` (counter): requests rejected by the limiter
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations behind the macros)
//! - Recording is always on; the exporter endpoint is opt-in

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint.
/// Requires a running Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint ready"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed request.
pub fn record_request(method: &Method, status: StatusCode, elapsed: Duration) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.as_u16().to_string(),
    )
    .increment(1);
    histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());
}

/// Record one request rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!("http_rate_limited_total").increment(1);
}
