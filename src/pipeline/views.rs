//! Template engine and the `Render` extractor.
//!
//! Templates under the configured root compile once at construction;
//! render calls at request time only evaluate. Handlers take a [`Render`]
//! argument, which arrives pre-seeded with the accumulated view state:
//! configured locals, request flags, locale, page meta, flash messages,
//! the CSRF token and the current user. `render("name")` produces an HTML
//! response.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use serde_json::{Map, Value};
use tera::Tera;

use crate::config::schema::ViewsConfig;
use crate::error::Result;
use crate::pipeline::context::{PageMeta, ViewState};
use crate::pipeline::csrf::CsrfToken;
use crate::pipeline::flash::IncomingFlash;
use crate::pipeline::i18n::Locale;
use crate::pipeline::passport::CurrentUser;
use crate::pipeline::state::AppState;

/// Compiled template engine plus the always-merged locals.
pub struct ViewEngine {
    tera: Tera,
    extension: String,
}

impl ViewEngine {
    /// Compile every template under the configured root. A root that does
    /// not exist yields an engine with no templates rather than an error.
    pub fn new(config: &ViewsConfig) -> Result<Self> {
        let pattern = format!("{}/**/*.{}", config.root.display(), config.extension);
        let tera = Tera::new(&pattern)?;
        Ok(Self {
            tera,
            extension: config.extension.clone(),
        })
    }

    /// Render `template` (extension optional) with a JSON object context.
    pub fn render(&self, template: &str, context: &Map<String, Value>) -> tera::Result<String> {
        let suffix = format!(".{}", self.extension);
        let name = if template.ends_with(&suffix) {
            template.to_string()
        } else {
            format!("{template}{suffix}")
        };
        let ctx = tera::Context::from_serialize(Value::Object(context.clone()))?;
        self.tera.render(&name, &ctx)
    }
}

/// Make the engine available to later stages and handlers.
pub async fn register_engine(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    req.extensions_mut().insert(state.views.clone());
    next.run(req).await
}

/// Handler-side rendering handle.
pub struct Render {
    engine: Arc<ViewEngine>,
    context: Map<String, Value>,
}

impl Render {
    /// Add or replace one context value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl serde::Serialize) {
        if let Ok(value) = serde_json::to_value(value) {
            self.context.insert(key.into(), value);
        }
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// Render the template into an HTML response; render failures log and
    /// produce a 500.
    pub fn render(self, template: &str) -> Response {
        match self.engine.render(template, &self.context) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::error!(template, error = %e, "Template render failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Template render failed").into_response()
            }
        }
    }
}

impl<S> FromRequestParts<S> for Render
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let engine = parts
            .extensions
            .get::<Arc<ViewEngine>>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

        let mut context = parts
            .extensions
            .get::<ViewState>()
            .map(|state| state.0.clone())
            .unwrap_or_default();

        if let Some(Locale(locale)) = parts.extensions.get::<Locale>() {
            context.insert("locale".to_string(), Value::String(locale.clone()));
        }
        if let Some(PageMeta(meta)) = parts.extensions.get::<PageMeta>() {
            let mut entry = Map::new();
            entry.insert("title".to_string(), Value::String(meta.title.clone()));
            entry.insert(
                "description".to_string(),
                Value::String(meta.description.clone()),
            );
            context.insert("meta".to_string(), Value::Object(entry));
        }
        if let Some(IncomingFlash(flash)) = parts.extensions.get::<IncomingFlash>() {
            context.insert("flash".to_string(), Value::Object(flash.clone()));
        }
        if let Some(CsrfToken(token)) = parts.extensions.get::<CsrfToken>() {
            context.insert("csrf".to_string(), Value::String(token.clone()));
        }
        if let Some(CurrentUser(user)) = parts.extensions.get::<CurrentUser>() {
            context.insert("user".to_string(), user.clone());
        }

        Ok(Render { engine, context })
    }
}
