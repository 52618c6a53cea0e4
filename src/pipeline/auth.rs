//! Basic-auth gate.
//!
//! Sits ahead of everything except timing, logging and the setup hook, so
//! a protected deployment never leaks rate-limit state, sessions or
//! static files to unauthenticated clients.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::pipeline::state::AppState;

pub async fn basic_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(auth) = &state.config.auth else {
        return next.run(req).await;
    };

    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        if credentials_match(value.as_bytes(), &auth.username, &auth.password) {
            return next.run(req).await;
        }
    }

    let challenge = format!("Basic realm=\"{}\"", auth.realm);
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        "Unauthorized",
    )
        .into_response()
}

fn credentials_match(header_value: &[u8], username: &str, password: &str) -> bool {
    let Some(encoded) = header_value.strip_prefix(b"Basic ") else {
        return false;
    };
    let Ok(decoded) = BASE64.decode(encoded) else {
        return false;
    };
    let Ok(pair) = std::str::from_utf8(&decoded) else {
        return false;
    };
    let Some((user, pass)) = pair.split_once(':') else {
        return false;
    };
    user == username && pass == password
}
