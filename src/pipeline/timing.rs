//! Request receipt timestamp and the `X-Response-Time` header.
//!
//! The timestamp middleware sits outermost so every later stage (and the
//! response-time measurement) sees the same monotonic start point.

use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

/// Monotonic instant the request was received, as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct ReceivedAt(pub Instant);

pub async fn record_received(mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(ReceivedAt(Instant::now()));
    next.run(req).await
}

pub async fn response_time(req: Request, next: Next) -> Response {
    let received = req.extensions().get::<ReceivedAt>().copied();
    let mut res = next.run(req).await;

    if let Some(ReceivedAt(start)) = received {
        let millis = start.elapsed().as_millis();
        if let Ok(value) = HeaderValue::from_str(&format!("{millis}ms")) {
            res.headers_mut().insert("x-response-time", value);
        }
    }
    res
}
