//! Last-seen IP persistence.
//!
//! Records where an authenticated user last connected from, off the
//! request path: the write runs in a spawned task and a failure only
//! warns. Requests never wait on it.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::pipeline::passport::CurrentUser;
use crate::pipeline::rate_limit::client_ip;
use crate::pipeline::state::AppState;

pub async fn persist_seen_ip(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if state.config.store_ip_address {
        if let Some(CurrentUser(user)) = req.extensions().get::<CurrentUser>() {
            let user_id = user
                .get("id")
                .map(|id| match id {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .filter(|id| !id.is_empty());

            if let Some(user_id) = user_id {
                let ip = client_ip(&req, state.config.env.trust_proxy);
                let store = state.store.clone();
                tokio::spawn(async move {
                    let key = format!("ip:{user_id}");
                    if let Err(e) = store.set(&key, ip.into_bytes(), None).await {
                        tracing::warn!(error = %e, "Failed to persist last-seen IP");
                    }
                });
            }
        }
    }
    next.run(req).await
}
