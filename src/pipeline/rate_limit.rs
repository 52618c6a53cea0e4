//! Fixed-window rate limiting over the cache store.
//!
//! Each client IP gets a counter (`ratelimit:<ip>`) incremented per
//! request; the window is the counter's expiry. Because the counter lives
//! in the shared store, processes sharing a backend enforce one combined
//! limit. A store failure lets the request through with a warning rather
//! than failing closed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::observability::metrics;
use crate::pipeline::state::AppState;

const LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Best-effort client address: the first `X-Forwarded-For` hop when the
/// environment says the proxy is trusted, else the socket peer.
pub(crate) fn client_ip(req: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit_requests(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(limits) = state.config.rate_limit.clone() else {
        return next.run(req).await;
    };
    if state.rate_limit_bypass.matches(req.uri().path()) {
        return next.run(req).await;
    }

    let ip = client_ip(&req, state.config.env.trust_proxy);
    let key = format!("ratelimit:{ip}");
    let window = Duration::from_secs(limits.duration_secs);

    let counter = match state.store.incr(&key, window).await {
        Ok(counter) => counter,
        Err(e) => {
            tracing::warn!(error = %e, "Rate limit store unavailable; allowing request");
            return next.run(req).await;
        }
    };

    // The window's real expiry, not now + window: stable across requests.
    let reset = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        + counter.remaining.as_secs();

    if counter.count > limits.max {
        metrics::record_rate_limited();
        tracing::warn!(ip = %ip, count = counter.count, max = limits.max, "Rate limit exceeded");

        let mut res = (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
        let headers = res.headers_mut();
        headers.insert(LIMIT, HeaderValue::from(limits.max));
        headers.insert(REMAINING, HeaderValue::from(0u64));
        headers.insert(RESET, HeaderValue::from(reset));
        headers.insert(
            "retry-after",
            HeaderValue::from(counter.remaining.as_secs().max(1)),
        );
        return res;
    }

    let remaining = limits.max - counter.count;
    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    headers.insert(LIMIT, HeaderValue::from(limits.max));
    headers.insert(REMAINING, HeaderValue::from(remaining));
    headers.insert(RESET, HeaderValue::from(reset));
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_forwarded(value: &str) -> Request {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn forwarded_header_wins_when_proxy_is_trusted() {
        let req = request_with_forwarded("203.0.113.9, 10.0.0.1");
        assert_eq!(client_ip(&req, true), "203.0.113.9");
    }

    #[test]
    fn forwarded_header_is_ignored_otherwise() {
        let req = request_with_forwarded("203.0.113.9");
        assert_eq!(client_ip(&req, false), "unknown");
    }

    #[test]
    fn socket_peer_is_the_fallback() {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(client_ip(&req, true), "127.0.0.1");
    }

    #[tokio::test]
    async fn reset_header_is_stable_within_a_window() {
        use axum::middleware;
        use axum::routing::get;
        use axum::Router;
        use tower::ServiceExt;

        use crate::config::schema::{RateLimitConfig, ServerConfig};

        let mut config = ServerConfig::default();
        config.rate_limit = Some(RateLimitConfig {
            max: 10,
            duration_secs: 60,
        });
        let state = Arc::new(AppState::from_config(config).unwrap());
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, limit_requests));

        let reset_of = |res: &Response| {
            res.headers()
                .get(RESET)
                .unwrap()
                .to_str()
                .unwrap()
                .parse::<u64>()
                .unwrap()
        };

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let second = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // A drifting reset would move forward with the second request.
        assert!(reset_of(&second) <= reset_of(&first));
    }
}
