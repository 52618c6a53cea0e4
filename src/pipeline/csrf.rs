//! CSRF protection.
//!
//! A per-session secret never leaves the server; tokens handed to views
//! are `<salt>.<base64url hmac-sha256(secret, salt)>`, so any number of
//! tokens verify against one secret. Safe methods mint the secret and a
//! token; mutating methods must present a valid token via the parsed
//! body, the query string or the conventional headers. Failures are a
//! uniform 403 with a localized message when i18n is active.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use sha2::Sha256;

use crate::pipeline::body::ParsedBody;
use crate::pipeline::i18n::Locale;
use crate::pipeline::session::Session;
use crate::pipeline::state::AppState;

/// Token for the current session, exposed to handlers and views.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

const SECRET_KEY: &str = "_csrf_secret";
const FIELD: &str = "_csrf";
const TOKEN_HEADERS: [&str; 4] = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"];

type HmacSha256 = Hmac<Sha256>;

fn random_alnum(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub(crate) fn generate_secret() -> String {
    random_alnum(24)
}

pub(crate) fn create_token(secret: &str) -> String {
    let salt = random_alnum(8);
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(salt.as_bytes());
            format!("{salt}.{}", URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
        }
        Err(_) => String::new(),
    }
}

pub(crate) fn verify_token(secret: &str, token: &str) -> bool {
    fn check(secret: &str, token: &str) -> Option<()> {
        let (salt, signature) = token.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(salt.as_bytes());
        mac.verify_slice(&signature).ok()
    }
    check(secret, token).is_some()
}

pub async fn verify_csrf(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if state.csrf_bypass.matches(req.uri().path()) {
        return next.run(req).await;
    }
    let Some(session) = req.extensions().get::<Session>().cloned() else {
        return next.run(req).await;
    };

    let secret = session
        .get(SECRET_KEY)
        .and_then(|v| v.as_str().map(str::to_string));

    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        let secret = match secret {
            Some(secret) => secret,
            None => {
                let secret = generate_secret();
                session.insert(SECRET_KEY, Value::String(secret.clone()));
                secret
            }
        };
        req.extensions_mut().insert(CsrfToken(create_token(&secret)));
        return next.run(req).await;
    }

    let Some(secret) = secret else {
        return forbidden(&state, &req);
    };
    match find_token(&req) {
        Some(token) if verify_token(&secret, &token) => {
            req.extensions_mut().insert(CsrfToken(create_token(&secret)));
            next.run(req).await
        }
        _ => forbidden(&state, &req),
    }
}

fn find_token(req: &Request) -> Option<String> {
    if let Some(ParsedBody(body)) = req.extensions().get::<ParsedBody>() {
        if let Some(token) = body.get(FIELD).and_then(|v| v.as_str()) {
            return Some(token.to_string());
        }
    }
    if let Some(query) = req.uri().query() {
        if let Some((_, token)) =
            url::form_urlencoded::parse(query.as_bytes()).find(|(key, _)| key == FIELD)
        {
            return Some(token.into_owned());
        }
    }
    for name in TOKEN_HEADERS {
        if let Some(token) = req.headers().get(name).and_then(|v| v.to_str().ok()) {
            return Some(token.to_string());
        }
    }
    None
}

fn forbidden(state: &AppState, req: &Request) -> Response {
    let message = match (&state.i18n, req.extensions().get::<Locale>()) {
        (Some(i18n), Some(Locale(locale))) => i18n.translate(locale, "Invalid CSRF token"),
        (Some(i18n), None) => i18n.translate(i18n.default_locale(), "Invalid CSRF token"),
        _ => "Invalid CSRF token".to_string(),
    };
    (StatusCode::FORBIDDEN, message).into_response()
}
