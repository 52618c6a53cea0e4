//! Favicon short-circuit.
//!
//! The icon is read once at construction; requests for `/favicon.ico`
//! never reach the session or routing machinery.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::pipeline::state::AppState;

pub async fn serve_favicon(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(favicon) = &state.favicon else {
        return next.run(req).await;
    };
    if req.uri().path() != "/favicon.ico" {
        return next.run(req).await;
    }

    match *req.method() {
        Method::GET | Method::HEAD => {
            let body = if req.method() == Method::HEAD {
                Body::empty()
            } else {
                Body::from(favicon.bytes.clone())
            };
            let mut res = Response::new(body);
            let headers = res.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("image/x-icon"),
            );
            headers.insert(
                header::CONTENT_LENGTH,
                HeaderValue::from(favicon.bytes.len()),
            );
            if let Ok(value) =
                HeaderValue::from_str(&format!("public, max-age={}", favicon.max_age_secs))
            {
                headers.insert(header::CACHE_CONTROL, value);
            }
            res
        }
        _ => (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
        )
            .into_response(),
    }
}
