//! Redirect-loop detection.
//!
//! Counts consecutive redirects to the same target in the session; once
//! the threshold is reached the client is sent to `/` instead of around
//! again. Any non-redirect response clears the counter.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;

use crate::pipeline::session::{Session, REDIRECT_KEY};
use crate::pipeline::state::AppState;

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

pub async fn detect_redirect_loop(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(config) = state.config.redirect_loop.clone() else {
        return next.run(req).await;
    };
    let session = req.extensions().get::<Session>().cloned();

    let mut res = next.run(req).await;
    let Some(session) = session else {
        return res;
    };

    if !is_redirect(res.status()) {
        if session.get(REDIRECT_KEY).is_some() {
            session.remove(REDIRECT_KEY);
        }
        return res;
    }

    let Some(location) = res
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return res;
    };

    let previous = session.get(REDIRECT_KEY);
    let count = match &previous {
        Some(entry)
            if entry.get("to").and_then(|v| v.as_str()) == Some(location.as_str()) =>
        {
            entry.get("count").and_then(|v| v.as_u64()).unwrap_or(0) + 1
        }
        _ => 1,
    };

    if count >= u64::from(config.max_redirects) {
        tracing::warn!(location = %location, count, "Redirect loop detected; breaking to /");
        session.remove(REDIRECT_KEY);
        res.headers_mut()
            .insert(header::LOCATION, HeaderValue::from_static("/"));
        return res;
    }

    session.insert(REDIRECT_KEY, json!({ "to": location, "count": count }));
    res
}
