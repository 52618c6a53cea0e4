//! Shared state behind the middleware pipeline.
//!
//! Everything derivable from configuration is computed here, once, at
//! construction: compiled path matchers, security header pairs, signing
//! keys, the template engine, the favicon bytes. Stages only read.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue};
use cookie::Key;
use tower_http::services::ServeDir;

use crate::config::schema::{ServerConfig, INSECURE_DEFAULT_SESSION_KEY};
use crate::config::validation::validate_config;
use crate::error::{Error, Result};
use crate::pathmatch::{PathMatcher, PathMatcherSet};
use crate::pipeline::helmet;
use crate::pipeline::i18n::I18nEngine;
use crate::pipeline::session;
use crate::pipeline::views::ViewEngine;
use crate::store::{CacheStore, InMemoryStore};

/// Favicon bytes and caching policy, read once at construction.
#[derive(Clone)]
pub struct FaviconAsset {
    pub bytes: Bytes,
    pub max_age_secs: u64,
}

/// Static file service plus its mount point.
#[derive(Clone)]
pub struct StaticFiles {
    pub serve: ServeDir,
    pub mount: String,
    pub max_age_secs: u64,
}

/// Immutable per-server state shared by every stage.
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn CacheStore>,
    pub views: Arc<ViewEngine>,
    pub i18n: Option<Arc<I18nEngine>>,

    /// Signing keys in configuration order; the first signs, all verify.
    pub signing_keys: Vec<Key>,
    pub cookie_name: String,

    pub helmet_headers: Vec<(HeaderName, HeaderValue)>,
    pub rate_limit_bypass: PathMatcherSet,
    pub csrf_bypass: PathMatcherSet,
    pub cache_rules: Vec<(PathMatcher, HeaderValue)>,
    pub favicon: Option<FaviconAsset>,
    pub static_files: Option<StaticFiles>,
}

impl AppState {
    /// Validate the configuration and precompute every derived piece.
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        validate_config(&config).map_err(Error::Config)?;

        let store: Arc<dyn CacheStore> = config
            .store
            .clone()
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));

        let session_keys = config.session_keys();
        if session_keys.iter().any(|k| k == INSECURE_DEFAULT_SESSION_KEY) {
            tracing::warn!(
                "No session signing keys configured; cookies are signed with the built-in \
                 default and are forgeable"
            );
        }
        let signing_keys = session_keys
            .iter()
            .map(|key| session::derive_signing_key(key))
            .collect();

        let helmet_headers = match &config.helmet {
            Some(helmet) => helmet::build_headers(helmet)?,
            None => Vec::new(),
        };

        let rate_limit_bypass = PathMatcherSet::compile(&config.rate_limit_ignored_globs)
            .map_err(|m| Error::config("rate_limit_ignored_globs", m))?;
        let csrf_bypass = PathMatcherSet::compile(&config.csrf_ignored_globs)
            .map_err(|m| Error::config("csrf_ignored_globs", m))?;

        let mut cache_rules = Vec::new();
        if let Some(cache_responses) = &config.cache_responses {
            for rule in &cache_responses.rules {
                let matcher = PathMatcher::parse(&rule.pattern)
                    .map_err(|m| Error::config("cache_responses.rules", m))?;
                let value = HeaderValue::from_str(&rule.value).map_err(|_| {
                    Error::config(
                        "cache_responses.rules",
                        format!("'{}' is not a valid header value", rule.value),
                    )
                })?;
                cache_rules.push((matcher, value));
            }
        }

        let favicon = match &config.favicon {
            Some(favicon) => {
                let bytes = std::fs::read(&favicon.path).map_err(|e| {
                    Error::config(
                        "favicon.path",
                        format!("{}: {e}", favicon.path.display()),
                    )
                })?;
                Some(FaviconAsset {
                    bytes: Bytes::from(bytes),
                    max_age_secs: favicon.max_age_secs,
                })
            }
            None => None,
        };

        let static_files = match (&config.build_dir, &config.serve_static) {
            (Some(dir), Some(opts)) => {
                let mut mount = opts.mount.trim_end_matches('/').to_string();
                if !mount.starts_with('/') {
                    mount.insert(0, '/');
                }
                Some(StaticFiles {
                    serve: ServeDir::new(dir).append_index_html_on_directories(true),
                    mount,
                    max_age_secs: opts.max_age_secs,
                })
            }
            _ => None,
        };

        let views = Arc::new(ViewEngine::new(&config.views)?);
        let i18n = config
            .i18n
            .as_ref()
            .map(|c| Arc::new(I18nEngine::new(c.clone())));

        let cookie_name = config.cookie_name();

        Ok(Self {
            config,
            store,
            views,
            i18n,
            signing_keys,
            cookie_name,
            helmet_headers,
            rate_limit_bypass,
            csrf_bypass,
            cache_rules,
            favicon,
            static_files,
        })
    }
}
