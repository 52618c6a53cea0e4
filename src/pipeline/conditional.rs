//! ETag generation and conditional-get handling.
//!
//! The etag middleware sits inside: it buffers eligible bodies (2xx
//! GET/HEAD with a known size under the cap) and tags them with a strong
//! sha-256 etag. Streaming and oversized bodies pass through untagged.
//! The conditional middleware sits outside and turns a matching
//! `If-None-Match` into an empty 304, keeping the validator headers.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

/// Bodies above this are never buffered for hashing.
const MAX_BUFFER: usize = 1024 * 1024;

pub async fn set_etag(req: Request, next: Next) -> Response {
    let eligible_method = matches!(*req.method(), Method::GET | Method::HEAD);
    let res = next.run(req).await;

    if !eligible_method
        || res.status() != StatusCode::OK
        || res.headers().contains_key(header::ETAG)
    {
        return res;
    }

    let Some(size) = http_body::Body::size_hint(res.body()).exact() else {
        return res;
    };
    if size == 0 || size > MAX_BUFFER as u64 {
        return res;
    }

    let (mut parts, body) = res.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BUFFER).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap_or_default()
        }
    };

    let tag = format!("\"{}\"", hex_digest(&bytes));
    if let Ok(value) = HeaderValue::from_str(&tag) {
        parts.headers.insert(header::ETAG, value);
    }
    Response::from_parts(parts, Body::from(bytes))
}

pub async fn conditional_get(req: Request, next: Next) -> Response {
    let eligible_method = matches!(*req.method(), Method::GET | Method::HEAD);
    let if_none_match = req
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let res = next.run(req).await;

    if !eligible_method || res.status() != StatusCode::OK {
        return res;
    }
    let (Some(if_none_match), Some(etag)) = (
        if_none_match,
        res.headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    ) else {
        return res;
    };

    if !etag_matches(&if_none_match, &etag) {
        return res;
    }

    let mut not_modified = Response::new(Body::empty());
    *not_modified.status_mut() = StatusCode::NOT_MODIFIED;
    for name in [
        header::ETAG,
        header::CACHE_CONTROL,
        header::CONTENT_LOCATION,
        header::EXPIRES,
        header::LAST_MODIFIED,
        header::VARY,
    ] {
        if let Some(value) = res.headers().get(&name) {
            not_modified.headers_mut().insert(name, value.clone());
        }
    }
    for value in res.headers().get_all(header::SET_COOKIE) {
        not_modified
            .headers_mut()
            .append(header::SET_COOKIE, value.clone());
    }
    not_modified
}

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if if_none_match.trim() == "*" {
        return true;
    }
    let strong = etag.strip_prefix("W/").unwrap_or(etag);
    if_none_match
        .split(',')
        .map(|candidate| {
            let candidate = candidate.trim();
            candidate.strip_prefix("W/").unwrap_or(candidate)
        })
        .any(|candidate| candidate == strong)
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "stable body" }))
            .layer(axum::middleware::from_fn(set_etag))
            .layer(axum::middleware::from_fn(conditional_get))
    }

    async fn etag_of(app: Router) -> String {
        let res = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        res.headers()
            .get(header::ETAG)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn stable_bodies_get_stable_etags() {
        let first = etag_of(app()).await;
        let second = etag_of(app()).await;
        assert_eq!(first, second);
        assert!(first.starts_with('"') && first.ends_with('"'));
    }

    #[tokio::test]
    async fn matching_if_none_match_yields_304() {
        let etag = etag_of(app()).await;
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::IF_NONE_MATCH, &etag)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(res.headers().get(header::ETAG).unwrap().to_str().unwrap(), etag);
        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn non_matching_if_none_match_is_a_full_response() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::IF_NONE_MATCH, "\"different\"")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn weak_comparison() {
        assert!(etag_matches("W/\"abc\"", "\"abc\""));
        assert!(etag_matches("\"x\", \"abc\"", "\"abc\""));
        assert!(etag_matches("*", "\"abc\""));
        assert!(!etag_matches("\"x\"", "\"abc\""));
    }
}
