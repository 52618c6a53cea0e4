//! Method override for form-bound clients.
//!
//! HTML forms only speak GET and POST; this stage lets a POST declare its
//! real verb through the configured sources, consulted in order. Only
//! PUT, PATCH and DELETE may be assumed, and only from a POST.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value;

use crate::config::schema::MethodOverrideSource;
use crate::pipeline::body::ParsedBody;
use crate::pipeline::state::AppState;

/// The verb the request arrived with, kept for logging and handlers.
#[derive(Debug, Clone)]
pub struct OriginalMethod(pub Method);

pub async fn override_method(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::POST || state.config.method_override.is_empty() {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    let parsed = parts.extensions.get::<ParsedBody>().map(|p| p.0.clone());

    let target = state
        .config
        .method_override
        .iter()
        .find_map(|source| extract(source, &parts, parsed.as_ref()))
        .filter(|method| {
            matches!(*method, Method::PUT | Method::PATCH | Method::DELETE)
        });

    if let Some(method) = target {
        tracing::debug!(from = %parts.method, to = %method, "Method override applied");
        parts.extensions.insert(OriginalMethod(parts.method.clone()));
        parts.method = method;
    }

    next.run(Request::from_parts(parts, body)).await
}

fn extract(
    source: &MethodOverrideSource,
    parts: &Parts,
    body: Option<&Value>,
) -> Option<Method> {
    match source {
        MethodOverrideSource::Header(name) => {
            let value = parts.headers.get(name.as_str())?.to_str().ok()?;
            parse_verb(value)
        }
        MethodOverrideSource::Query(name) => {
            let query = parts.uri.query()?;
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == name.as_str())
                .and_then(|(_, value)| parse_verb(&value))
        }
        MethodOverrideSource::BodyField(name) => {
            let value = body?.get(name)?.as_str()?;
            parse_verb(value)
        }
        MethodOverrideSource::Custom(f) => f(parts, body),
    }
}

fn parse_verb(value: &str) -> Option<Method> {
    Method::from_bytes(value.trim().to_ascii_uppercase().as_bytes()).ok()
}
