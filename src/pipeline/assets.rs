//! Static asset serving at a fixed pipeline position.
//!
//! The file service is probed with a copy of the request head; a hit is
//! returned on the spot, a miss falls through to the rest of the
//! pipeline. Mounting as a router fallback instead would move static
//! files after the session and body stages, which is the wrong spot for
//! them.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::Response;
use tower::ServiceExt;

use crate::pipeline::state::AppState;

pub async fn serve_static(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(files) = &state.static_files else {
        return next.run(req).await;
    };
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return next.run(req).await;
    }

    let path = req.uri().path();
    let stripped = if files.mount.is_empty() || files.mount == "/" {
        Some(path)
    } else {
        path.strip_prefix(files.mount.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    };
    let Some(file_path) = stripped else {
        return next.run(req).await;
    };
    let file_path = if file_path.is_empty() { "/" } else { file_path };

    let probe_uri: Uri = match file_path.parse() {
        Ok(uri) => uri,
        Err(_) => return next.run(req).await,
    };
    let mut probe = Request::builder()
        .method(req.method().clone())
        .uri(probe_uri);
    if let Some(range) = req.headers().get(header::RANGE) {
        probe = probe.header(header::RANGE, range.clone());
    }
    if let Some(if_modified) = req.headers().get(header::IF_MODIFIED_SINCE) {
        probe = probe.header(header::IF_MODIFIED_SINCE, if_modified.clone());
    }
    let Ok(probe) = probe.body(Body::empty()) else {
        return next.run(req).await;
    };

    // ServeDir is infallible; a miss comes back as 404.
    let served = match files.serve.clone().oneshot(probe).await {
        Ok(res) => res,
        Err(_) => return next.run(req).await,
    };
    if served.status() == StatusCode::NOT_FOUND {
        return next.run(req).await;
    }

    let mut res = served.map(Body::new);
    if res.status().is_success() && !res.headers().contains_key(header::CACHE_CONTROL) {
        if let Ok(value) =
            HeaderValue::from_str(&format!("public, max-age={}", files.max_age_secs))
        {
            res.headers_mut().insert(header::CACHE_CONTROL, value);
        }
    }
    res
}
