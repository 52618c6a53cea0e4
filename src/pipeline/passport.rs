//! Session-auth integration.
//!
//! When a session references a logged-in user, the configured loader
//! resolves it to a full record, exposed as a [`CurrentUser`] extension.
//! A reference the loader no longer recognizes is scrubbed from the
//! session, logging the visitor out instead of erroring forever.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value;

use crate::pipeline::session::Session;
use crate::pipeline::state::AppState;

/// The authenticated user's record, as a request extension.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Value);

pub async fn load_current_user(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(passport) = state.config.passport.clone() else {
        return next.run(req).await;
    };
    let Some(session) = req.extensions().get::<Session>().cloned() else {
        return next.run(req).await;
    };
    let Some(reference) = session.get(&passport.user_key) else {
        return next.run(req).await;
    };

    match passport.loader.load_user(&reference).await {
        Some(user) => {
            req.extensions_mut().insert(CurrentUser(user));
        }
        None => {
            tracing::debug!("Session references an unknown user; clearing");
            session.remove(&passport.user_key);
        }
    }
    next.run(req).await
}
