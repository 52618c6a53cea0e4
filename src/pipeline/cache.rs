//! Response caching over the cache store, and named `Cache-Control` rules.
//!
//! The generic cache stores whole 200 GET responses (status, headers,
//! body) under `cache:<path?query>` for the configured TTL and replays
//! them without invoking anything further down the pipeline. `X-Cache`
//! reports `HIT` or `MISS`. Responses that set cookies, opt out via
//! `no-store`, stream, or exceed the size cap are never stored.
//!
//! The rules middleware is much smaller: it stamps a configured
//! `Cache-Control` value onto responses whose path matches, unless the
//! handler already chose one.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::pipeline::state::AppState;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Stored representation of a cached response.
#[derive(Serialize, Deserialize)]
struct CachedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body_b64: String,
}

pub async fn serve_cached(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(cache) = state.config.cache.clone() else {
        return next.run(req).await;
    };
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let key = match req.uri().query() {
        Some(query) => format!("cache:{}?{query}", req.uri().path()),
        None => format!("cache:{}", req.uri().path()),
    };

    match state.store.get(&key).await {
        Ok(Some(stored)) => {
            if let Some(res) = replay(&stored) {
                return res;
            }
            // Undecodable entry: drop it and fall through as a miss.
            let _ = state.store.delete(&key).await;
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Response cache unavailable; bypassing");
            return next.run(req).await;
        }
    }

    let res = next.run(req).await;
    let mut res = maybe_store(&state, &key, res, &cache).await;
    res.headers_mut()
        .insert(X_CACHE, HeaderValue::from_static("MISS"));
    res
}

fn replay(stored: &[u8]) -> Option<Response> {
    let cached: CachedResponse = serde_json::from_slice(stored).ok()?;
    let body = BASE64.decode(&cached.body_b64).ok()?;

    let mut res = Response::new(Body::from(body.clone()));
    *res.status_mut() = StatusCode::from_u16(cached.status).ok()?;
    for (name, value) in &cached.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
        let value = HeaderValue::from_str(value).ok()?;
        res.headers_mut().append(name, value);
    }
    res.headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    res.headers_mut()
        .insert(X_CACHE, HeaderValue::from_static("HIT"));
    Some(res)
}

async fn maybe_store(
    state: &AppState,
    key: &str,
    res: Response,
    cache: &crate::config::schema::ResponseCacheConfig,
) -> Response {
    if res.status() != StatusCode::OK
        || res.headers().contains_key(header::SET_COOKIE)
        || opts_out(res.headers().get(header::CACHE_CONTROL))
        || !cacheable_content_type(res.headers().get(header::CONTENT_TYPE))
    {
        return res;
    }

    let Some(size) = http_body::Body::size_hint(res.body()).exact() else {
        return res;
    };
    if size > cache.max_body_bytes as u64 {
        return res;
    }

    let (parts, body) = res.into_parts();
    let bytes = match axum::body::to_bytes(body, cache.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap_or_default()
        }
    };

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !skip_header(name))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let entry = CachedResponse {
        status: parts.status.as_u16(),
        headers,
        body_b64: BASE64.encode(&bytes),
    };

    if let Ok(serialized) = serde_json::to_vec(&entry) {
        if let Err(e) = state
            .store
            .set(key, serialized, Some(Duration::from_secs(cache.ttl_secs)))
            .await
        {
            tracing::warn!(error = %e, "Failed to store cached response");
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn opts_out(cache_control: Option<&HeaderValue>) -> bool {
    cache_control
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| {
            let v = v.to_ascii_lowercase();
            v.contains("no-store") || v.contains("private")
        })
}

fn cacheable_content_type(content_type: Option<&HeaderValue>) -> bool {
    content_type
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| {
            v.starts_with("text/")
                || v.starts_with("application/json")
                || v.starts_with("application/javascript")
                || v.starts_with("image/svg+xml")
        })
}

fn skip_header(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "set-cookie" | "connection" | "keep-alive" | "transfer-encoding" | "content-length"
    )
}

pub async fn apply_cache_rules(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let mut res = next.run(req).await;

    if res.headers().contains_key(header::CACHE_CONTROL) {
        return res;
    }
    if let Some((_, value)) = state
        .cache_rules
        .iter()
        .find(|(matcher, _)| matcher.matches(&path))
    {
        res.headers_mut()
            .insert(header::CACHE_CONTROL, value.clone());
    }
    res
}
