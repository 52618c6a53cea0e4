//! Locale detection, redirect and translation.
//!
//! Locale comes from the path prefix first (`/en/about`), then the locale
//! cookie, then `Accept-Language`. HTML navigations without a prefix are
//! redirected to the prefixed path so every public URL carries its locale;
//! API-shaped requests just get a `Locale` extension and
//! `Content-Language`. The redirect sits after the security headers and
//! before the caching stages, so it is never cached and still carries the
//! configured header policy.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::schema::I18nConfig;
use crate::pipeline::state::AppState;

/// Detected request locale, as a request extension.
#[derive(Debug, Clone)]
pub struct Locale(pub String);

/// Translator bound to the detected locale, as a request extension.
#[derive(Clone)]
pub struct Translator {
    engine: Arc<I18nEngine>,
    locale: String,
}

impl Translator {
    pub fn t(&self, key: &str) -> String {
        self.engine.translate(&self.locale, key)
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }
}

/// Compiled locale settings and catalogs.
pub struct I18nEngine {
    config: I18nConfig,
}

impl I18nEngine {
    pub fn new(config: I18nConfig) -> Self {
        Self { config }
    }

    pub fn default_locale(&self) -> &str {
        &self.config.default_locale
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn set_cookie(&self) -> bool {
        self.config.set_cookie
    }

    /// Translate `key` for `locale`, falling back to the default locale's
    /// catalog and finally to the key itself.
    pub fn translate(&self, locale: &str, key: &str) -> String {
        if let Some(phrase) = self.config.catalogs.get(locale).and_then(|c| c.get(key)) {
            return phrase.clone();
        }
        if let Some(phrase) = self
            .config
            .catalogs
            .get(&self.config.default_locale)
            .and_then(|c| c.get(key))
        {
            return phrase.clone();
        }
        key.to_string()
    }

    /// Split a supported locale prefix off the path: `/en/about` becomes
    /// `("en", "/about")`.
    pub fn path_locale<'a>(&self, path: &'a str) -> Option<(&str, &'a str)> {
        let rest = path.strip_prefix('/')?;
        let (head, tail) = match rest.split_once('/') {
            Some((head, tail)) => (head, tail),
            None => (rest, ""),
        };
        let locale = self.config.locales.iter().find(|l| l.as_str() == head)?;
        if tail.is_empty() {
            Some((locale, "/"))
        } else {
            Some((locale, &path[1 + head.len()..]))
        }
    }

    /// Pick a locale for a request without a path prefix: cookie first,
    /// then the highest-weighted supported `Accept-Language` tag, then
    /// the default.
    pub fn negotiate(&self, cookie: Option<&str>, accept: Option<&str>) -> String {
        if let Some(locale) = cookie {
            if self.supports(locale) {
                return locale.to_string();
            }
        }
        if let Some(accept) = accept {
            let mut best: Option<(f32, String)> = None;
            for entry in accept.split(',') {
                let mut parts = entry.split(';');
                let tag = parts.next().unwrap_or("").trim();
                if tag.is_empty() {
                    continue;
                }
                let q = parts
                    .find_map(|param| param.trim().strip_prefix("q="))
                    .and_then(|value| value.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                // q=0 means "not acceptable".
                if q <= 0.0 {
                    continue;
                }
                let supported = if self.supports(tag) {
                    Some(tag)
                } else {
                    let primary = tag.split('-').next().unwrap_or(tag);
                    self.supports(primary).then_some(primary)
                };
                if let Some(locale) = supported {
                    // Strictly greater, so equal weights keep the earlier entry.
                    if best.as_ref().map_or(true, |(top, _)| q > *top) {
                        best = Some((q, locale.to_string()));
                    }
                }
            }
            if let Some((_, locale)) = best {
                return locale;
            }
        }
        self.config.default_locale.clone()
    }

    fn supports(&self, locale: &str) -> bool {
        self.config.locales.iter().any(|l| l == locale)
    }
}

pub async fn detect_locale(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(engine) = state.i18n.clone() else {
        return next.run(req).await;
    };

    let path = req.uri().path().to_string();

    if let Some((locale, _rest)) = engine.path_locale(&path) {
        let locale = locale.to_string();
        let cookie_stale = engine.set_cookie()
            && locale_cookie(req.headers(), engine.cookie_name()).as_deref() != Some(&locale);

        req.extensions_mut().insert(Locale(locale.clone()));
        req.extensions_mut().insert(Translator {
            engine: engine.clone(),
            locale: locale.clone(),
        });
        let mut res = next.run(req).await;
        decorate(res.headers_mut(), &locale);
        if cookie_stale {
            let cookie = format!(
                "{}={locale}; Path=/; SameSite=Lax",
                engine.cookie_name()
            );
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                res.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        return res;
    }

    let cookie = locale_cookie(req.headers(), engine.cookie_name());
    let accept = req
        .headers()
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let locale = engine.negotiate(cookie.as_deref(), accept.as_deref());

    if wants_html(&req) {
        let suffix = if path == "/" { "" } else { path.as_str() };
        let target = match req.uri().query() {
            Some(query) => format!("/{locale}{suffix}?{query}"),
            None => format!("/{locale}{suffix}"),
        };
        if let Ok(location) = HeaderValue::from_str(&target) {
            let mut res =
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
            append_vary(res.headers_mut());
            return res;
        }
    }

    req.extensions_mut().insert(Locale(locale.clone()));
    req.extensions_mut().insert(Translator {
        engine: engine.clone(),
        locale: locale.clone(),
    });
    let mut res = next.run(req).await;
    decorate(res.headers_mut(), &locale);
    res
}

fn wants_html(req: &Request) -> bool {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return false;
    }
    req.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn locale_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for piece in cookie::Cookie::split_parse(raw.to_string()) {
        if let Ok(cookie) = piece {
            if cookie.name() == name {
                return Some(cookie.value().to_string());
            }
        }
    }
    None
}

fn decorate(headers: &mut HeaderMap, locale: &str) {
    if let Ok(value) = HeaderValue::from_str(locale) {
        headers.insert(header::CONTENT_LANGUAGE, value);
    }
    append_vary(headers);
}

fn append_vary(headers: &mut HeaderMap) {
    match headers.get(header::VARY).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.to_ascii_lowercase().contains("accept-language") => {
            let combined = format!("{existing}, Accept-Language");
            if let Ok(value) = HeaderValue::from_str(&combined) {
                headers.insert(header::VARY, value);
            }
        }
        Some(_) => {}
        None => {
            headers.insert(header::VARY, HeaderValue::from_static("Accept-Language"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn engine() -> I18nEngine {
        let mut catalogs = HashMap::new();
        let mut en = HashMap::new();
        en.insert("greeting".to_string(), "Hello".to_string());
        let mut de = HashMap::new();
        de.insert("greeting".to_string(), "Hallo".to_string());
        catalogs.insert("en".to_string(), en);
        catalogs.insert("de".to_string(), de);

        I18nEngine::new(I18nConfig {
            locales: vec!["en".to_string(), "de".to_string()],
            default_locale: "en".to_string(),
            catalogs,
            ..Default::default()
        })
    }

    #[test]
    fn path_prefix_is_detected() {
        let engine = engine();
        assert_eq!(engine.path_locale("/de/about"), Some(("de", "/about")));
        assert_eq!(engine.path_locale("/de"), Some(("de", "/")));
        assert_eq!(engine.path_locale("/fr/about"), None);
        assert_eq!(engine.path_locale("/about"), None);
    }

    #[test]
    fn negotiation_prefers_the_cookie() {
        let engine = engine();
        assert_eq!(engine.negotiate(Some("de"), Some("en;q=0.9")), "de");
        assert_eq!(engine.negotiate(Some("fr"), Some("de, en;q=0.5")), "de");
        assert_eq!(engine.negotiate(None, Some("fr-FR, de-AT;q=0.8")), "de");
        assert_eq!(engine.negotiate(None, None), "en");
    }

    #[test]
    fn negotiation_honors_quality_weights() {
        let engine = engine();
        // Listed order must not beat a heavier weight.
        assert_eq!(engine.negotiate(None, Some("en;q=0.1, de;q=0.9")), "de");
        assert_eq!(engine.negotiate(None, Some("de;q=0, en;q=0.4")), "en");
        // Equal weights fall back to listed order.
        assert_eq!(engine.negotiate(None, Some("de, en")), "de");
    }

    #[test]
    fn translation_falls_back_to_default_then_key() {
        let engine = engine();
        assert_eq!(engine.translate("de", "greeting"), "Hallo");
        assert_eq!(engine.translate("fr", "greeting"), "Hello");
        assert_eq!(engine.translate("de", "missing"), "missing");
    }
}
