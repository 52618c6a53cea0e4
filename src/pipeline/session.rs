//! Cache-store-backed sessions with a signed cookie.
//!
//! The cookie carries only the session id, HMAC-signed with the first
//! configured key; every configured key verifies, so keys can rotate.
//! Session data is JSON in the store under `sess:<id>`. The session loads
//! before downstream stages run and persists after they return: a fresh
//! session is only written (and its cookie only set) once something is
//! stored in it, so anonymous API traffic stays cookieless.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use cookie::{Cookie, CookieJar, Key};
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};

use crate::config::schema::Protocol;
use crate::pipeline::state::AppState;

pub(crate) const STORE_PREFIX: &str = "sess:";
pub(crate) const FLASH_KEY: &str = "_flash";
pub(crate) const REDIRECT_KEY: &str = "_redirects";

/// Stretch a configured secret into signing-key material. Sha-512 output
/// is exactly the 64 bytes the cookie key requires.
pub(crate) fn derive_signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    data: Map<String, Value>,
    dirty: bool,
    destroyed: bool,
    fresh: bool,
}

/// Cheap, cloneable handle to the request's session.
#[derive(Clone)]
pub struct Session(Arc<Mutex<SessionInner>>);

impl Session {
    fn new(id: String, data: Map<String, Value>, fresh: bool) -> Self {
        Self(Arc::new(Mutex::new(SessionInner {
            id,
            data,
            dirty: false,
            destroyed: false,
            fresh,
        })))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().data.get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let mut inner = self.lock();
        inner.data.insert(key.into(), value);
        inner.dirty = true;
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.lock();
        let removed = inner.data.remove(key);
        if removed.is_some() {
            inner.dirty = true;
        }
        removed
    }

    /// Queue a flash message for the next request.
    pub fn flash(&self, level: &str, message: &str) {
        let mut inner = self.lock();
        let bucket = inner
            .data
            .entry(FLASH_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(levels) = bucket {
            let entries = levels
                .entry(level.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = entries {
                list.push(Value::String(message.to_string()));
            }
        }
        inner.dirty = true;
    }

    /// Remove and return the pending flash map, if any.
    pub(crate) fn take_flash(&self) -> Option<Map<String, Value>> {
        match self.remove(FLASH_KEY) {
            Some(Value::Object(map)) => Some(map),
            Some(_) | None => None,
        }
    }

    /// Drop the session: store entry deleted, cookie expired.
    pub fn destroy(&self) {
        let mut inner = self.lock();
        inner.data.clear();
        inner.destroyed = true;
        inner.dirty = true;
    }

    fn snapshot(&self) -> (String, Map<String, Value>, bool, bool, bool) {
        let inner = self.lock();
        (
            inner.id.clone(),
            inner.data.clone(),
            inner.dirty,
            inner.destroyed,
            inner.fresh,
        )
    }
}

pub async fn attach_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = load_session(&state, req.headers()).await;
    req.extensions_mut().insert(session.clone());

    let mut res = next.run(req).await;

    let (id, data, dirty, destroyed, fresh) = session.snapshot();
    let store_key = format!("{STORE_PREFIX}{id}");

    if destroyed {
        if let Err(e) = state.store.delete(&store_key).await {
            tracing::warn!(error = %e, "Failed to delete destroyed session");
        }
        append_cookie(&mut res, removal_cookie(&state));
        return res;
    }

    if dirty {
        match serde_json::to_vec(&Value::Object(data)) {
            Ok(serialized) => {
                let ttl = Duration::from_secs(state.config.session.ttl_secs);
                if let Err(e) = state.store.set(&store_key, serialized, Some(ttl)).await {
                    tracing::warn!(error = %e, "Failed to persist session");
                } else if fresh {
                    if let Some(cookie) = signed_cookie(&state, &id) {
                        append_cookie(&mut res, cookie);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize session"),
        }
    }

    res
}

// Takes `&HeaderMap` rather than `&Request`: the request body is not
// `Sync`, so borrowing the whole request across the store await would
// make the middleware future non-`Send`.
async fn load_session(state: &AppState, headers: &HeaderMap) -> Session {
    if let Some(sid) = verified_sid(state, headers) {
        match state.store.get(&format!("{STORE_PREFIX}{sid}")).await {
            Ok(Some(stored)) => {
                if let Ok(Value::Object(data)) = serde_json::from_slice::<Value>(&stored) {
                    return Session::new(sid, data, false);
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Session store unavailable; using a fresh session");
            }
        }
    }
    Session::new(state.config.gen_sid.generate(), Map::new(), true)
}

/// Extract and signature-check the session id from the cookie header.
/// Any configured key may verify; tampering yields `None`.
fn verified_sid(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .to_string();
    let signed_value = cookie::Cookie::split_parse(raw)
        .flatten()
        .find(|c| c.name() == state.cookie_name)
        .map(|c| c.value().to_string())?;

    for key in &state.signing_keys {
        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(state.cookie_name.clone(), signed_value.clone()));
        if let Some(verified) = jar.signed(key).get(&state.cookie_name) {
            return Some(verified.value().to_string());
        }
    }
    None
}

fn signed_cookie(state: &AppState, sid: &str) -> Option<Cookie<'static>> {
    let key = state.signing_keys.first()?;
    let mut jar = CookieJar::new();
    jar.signed_mut(key).add(base_cookie(state, sid.to_string()));
    jar.delta().next().map(|c| c.clone().into_owned())
}

fn base_cookie(state: &AppState, value: String) -> Cookie<'static> {
    let session = &state.config.session;
    let secure = session
        .secure
        .unwrap_or(state.config.protocol == Protocol::Https);

    let mut builder = Cookie::build((state.cookie_name.clone(), value))
        .path(session.path.clone())
        .http_only(session.http_only)
        .same_site(session.same_site.into())
        .max_age(cookie::time::Duration::seconds(session.ttl_secs as i64));
    if secure {
        builder = builder.secure(true);
    }
    builder.build()
}

fn removal_cookie(state: &AppState) -> Cookie<'static> {
    let mut cookie = base_cookie(state, String::new());
    cookie.set_max_age(cookie::time::Duration::ZERO);
    cookie
}

// The signed value is base64, legal raw in a cookie-value, so the header
// is written unencoded and read back with a plain split-parse.
fn append_cookie(res: &mut Response, cookie: Cookie<'static>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        res.headers_mut().append(header::SET_COOKIE, value);
    }
}
