//! Terminal not-found handler.
//!
//! Mounted as the router fallback, so anything no route or middleware
//! claimed ends here: JSON for API-shaped requests, plain text otherwise,
//! localized when a locale was detected.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use crate::pipeline::context::Ajax;
use crate::pipeline::i18n::Locale;
use crate::pipeline::state::AppState;

pub async fn handle_not_found(state: Arc<AppState>, req: Request) -> Response {
    let message = match (&state.i18n, req.extensions().get::<Locale>()) {
        (Some(i18n), Some(Locale(locale))) => i18n.translate(locale, "Not Found"),
        (Some(i18n), None) => i18n.translate(i18n.default_locale(), "Not Found"),
        _ => "Not Found".to_string(),
    };

    let wants_json = req
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
        || req.extensions().get::<Ajax>().is_some_and(|a| a.0);

    if wants_json {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    } else {
        (StatusCode::NOT_FOUND, message).into_response()
    }
}
