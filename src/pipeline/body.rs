//! Request body parsing and pretty JSON responses.
//!
//! Form and JSON bodies are buffered up to a cap, parsed into a
//! [`ParsedBody`] extension, and the raw bytes are put back so handler
//! extractors still see the original body. The response half re-serializes
//! JSON bodies with indentation when configured — a development nicety the
//! size cap keeps from becoming a production hazard.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::pipeline::state::AppState;

/// Parsed request body, JSON-shaped regardless of the wire format.
#[derive(Debug, Clone)]
pub struct ParsedBody(pub Value);

const MAX_BODY: usize = 1024 * 1024;

enum BodyKind {
    Json,
    Form,
}

pub async fn parse_body(req: Request, next: Next) -> Response {
    if !matches!(
        *req.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    ) {
        return next.run(req).await;
    }

    let kind = match req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        Some(ct) if ct.starts_with("application/json") => BodyKind::Json,
        Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => BodyKind::Form,
        _ => return next.run(req).await,
    };

    let (mut parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
        }
    };

    if !bytes.is_empty() {
        let parsed = match kind {
            BodyKind::Json => match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => value,
                Err(_) => {
                    return (StatusCode::BAD_REQUEST, "Invalid JSON body").into_response()
                }
            },
            BodyKind::Form => parse_form(&bytes),
        };
        parts.extensions.insert(ParsedBody(parsed));
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    next.run(req).await
}

fn parse_form(bytes: &[u8]) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        map.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    Value::Object(map)
}

pub async fn pretty_json(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let res = next.run(req).await;
    if !state.config.json.pretty {
        return res;
    }

    let is_json = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return res;
    }

    let Some(size) = http_body::Body::size_hint(res.body()).exact() else {
        return res;
    };
    if size == 0 || size > state.config.json.max_body_bytes as u64 {
        return res;
    }

    let (mut parts, body) = res.into_parts();
    let bytes = match axum::body::to_bytes(body, state.config.json.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap_or_default()
        }
    };

    let pretty = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|value| serde_json::to_vec_pretty(&value).ok());
    match pretty {
        Some(pretty) => {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(pretty.len()));
            Response::from_parts(parts, Body::from(pretty))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}
