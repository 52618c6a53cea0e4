//! Flash messages.
//!
//! Messages queued via [`Session::flash`] live under a reserved session
//! key until the next request, where this stage drains them into an
//! [`IncomingFlash`] extension. Draining dirties the session, so a read
//! flash is gone for good.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};

use crate::pipeline::session::Session;

/// Flash messages drained for this request: level → list of messages.
#[derive(Debug, Clone, Default)]
pub struct IncomingFlash(pub Map<String, Value>);

pub async fn sweep_flash(mut req: Request, next: Next) -> Response {
    if let Some(session) = req.extensions().get::<Session>().cloned() {
        let flash = session.take_flash().unwrap_or_default();
        req.extensions_mut().insert(IncomingFlash(flash));
    }
    next.run(req).await
}
