//! Request context flags and the base view state.
//!
//! Three small stages: an AJAX flag read from `X-Requested-With`, SEO
//! meta by exact path, and the seed view state (configured locals plus
//! request facts) that `Render` later merges with the session-derived
//! pieces.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};

use crate::config::schema::MetaEntry;
use crate::pipeline::state::AppState;

/// Whether the request looks like an XHR call, as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct Ajax(pub bool);

/// SEO title/description matched for this path.
#[derive(Debug, Clone)]
pub struct PageMeta(pub MetaEntry);

/// Base view state seeded before the session stages run.
#[derive(Debug, Clone, Default)]
pub struct ViewState(pub Map<String, Value>);

pub async fn flag_ajax(mut req: Request, next: Next) -> Response {
    let is_ajax = req
        .headers()
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    req.extensions_mut().insert(Ajax(is_ajax));
    next.run(req).await
}

pub async fn attach_meta(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(entry) = state.config.meta.get(req.uri().path()) {
        req.extensions_mut().insert(PageMeta(entry.clone()));
    }
    next.run(req).await
}

pub async fn seed_view_state(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut map = state.config.views.locals.clone();
    map.insert(
        "path".to_string(),
        Value::String(req.uri().path().to_string()),
    );
    map.insert("url".to_string(), Value::String(req.uri().to_string()));
    let is_ajax = req.extensions().get::<Ajax>().is_some_and(|a| a.0);
    map.insert("ajax".to_string(), Value::Bool(is_ajax));

    req.extensions_mut().insert(ViewState(map));
    next.run(req).await
}
