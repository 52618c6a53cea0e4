//! Structured request logging and error classification.
//!
//! One event per request, carrying the request id, method, path, status
//! and latency. Severity follows the status class: info below 400, warn
//! for client errors, error for 5xx. Failures anywhere in the pipeline
//! surface as status codes and funnel through here; nothing else in the
//! crate double-logs a failed request.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::observability::metrics;
use crate::pipeline::request_id::REQUEST_ID_HEADER;

pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let res = next.run(req).await;
    let elapsed = start.elapsed();
    let status = res.status();

    metrics::record_request(&method, status, elapsed);

    let latency_ms = elapsed.as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms,
            "Request failed"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms,
            "Request rejected"
        );
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms,
            "Request completed"
        );
    }

    res
}
