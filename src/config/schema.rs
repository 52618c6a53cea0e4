//! Configuration schema definitions.
//!
//! This module defines the complete configuration surface for the server
//! assembly. Plain-data sections derive Serde traits so a TOML overlay can
//! be merged over the defaults; capability fields (hooks, routes, id
//! generator, user loader) are function-typed and only settable in code.
//!
//! Missing fields fall back to [`ServerConfig::default`], which itself is
//! [`ServerConfig::with_env`] applied to an empty [`EnvSnapshot`]. That
//! keeps environment-derived defaults out of the picture unless a captured
//! snapshot is passed in explicitly.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::Method;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::config::env::EnvSnapshot;
use crate::error::Error;
use crate::store::CacheStore;

/// Fallback signing key used when neither the caller nor the environment
/// provides one. Construction logs a warning when it is in effect.
pub const INSECURE_DEFAULT_SESSION_KEY: &str = "chassis-insecure-default-key";

/// Root configuration for the assembled web server.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Transport selection: plain HTTP/1.1 or TLS with h2 + http/1.1 ALPN.
    pub protocol: Protocol,

    /// Default bind host for `listen`.
    pub host: String,

    /// Default bind port for `listen`.
    pub port: u16,

    /// TLS material; required when `protocol` is `https`.
    pub ssl: Option<SslConfig>,

    /// Request deadline. `None` disables the timeout stage.
    pub timeout: Option<TimeoutConfig>,

    /// Basic-auth gate applied ahead of everything else.
    pub auth: Option<BasicAuthConfig>,

    /// Fixed-window rate limiting over the cache store.
    pub rate_limit: Option<RateLimitConfig>,

    /// Request paths matching any of these globs bypass rate limiting.
    pub rate_limit_ignored_globs: Vec<String>,

    /// Security response headers. `None` disables the stage entirely.
    pub helmet: Option<HelmetConfig>,

    /// Locale detection, redirect and translation catalogs.
    pub i18n: Option<I18nConfig>,

    /// Cross-origin resource sharing policy.
    pub cors: Option<CorsConfig>,

    /// Response compression codecs and quality.
    pub compress: CompressConfig,

    /// Generic response cache over the cache store.
    pub cache: Option<ResponseCacheConfig>,

    /// Named `Cache-Control` rules applied by path pattern.
    pub cache_responses: Option<CacheControlConfig>,

    /// Favicon short-circuit. The icon is read once at construction.
    pub favicon: Option<FaviconConfig>,

    /// Static asset root. Serving also requires `serve_static`.
    pub build_dir: Option<PathBuf>,

    /// Static asset mount options. Serving also requires `build_dir`.
    pub serve_static: Option<StaticConfig>,

    /// Template lookup root and engine options.
    pub views: ViewsConfig,

    /// SEO title/description by path. Empty disables the stage.
    pub meta: HashMap<String, MetaEntry>,

    /// Session cookie and persistence settings.
    pub session: SessionConfig,

    /// Redirect-loop detection over the session.
    pub redirect_loop: Option<RedirectLoopConfig>,

    /// Pretty-print JSON response bodies.
    pub json: JsonConfig,

    /// CSRF token validation on state-changing requests. Forced off when
    /// the environment snapshot has `test_mode`.
    pub csrf: bool,

    /// Request paths matching any of these globs bypass CSRF validation.
    pub csrf_ignored_globs: Vec<String>,

    /// Persist the client IP of authenticated requests in the background.
    pub store_ip_address: bool,

    /// Metrics/log-level settings consumed by the host binary.
    pub observability: ObservabilityConfig,

    /// Environment snapshot the defaults were derived from.
    #[serde(skip)]
    pub env: EnvSnapshot,

    /// Session id generator.
    #[serde(skip)]
    pub gen_sid: SidGenerator,

    /// Ordered method-override extraction sources.
    #[serde(skip)]
    pub method_override: Vec<MethodOverrideSource>,

    /// Session-auth integration (user loading behind the session).
    #[serde(skip)]
    pub passport: Option<PassportConfig>,

    /// Router transform invoked before the auth/security stages attach.
    #[serde(skip)]
    pub hook_before_setup: Option<RouterHook>,

    /// Router transform invoked just before the routes mount.
    #[serde(skip)]
    pub hook_before_routes: Option<RouterHook>,

    /// Application routes, mounted at the end of the pipeline.
    #[serde(skip)]
    pub routes: Option<Router>,

    /// Cache-store backend override. Defaults to the in-memory store.
    #[serde(skip)]
    pub store: Option<Arc<dyn CacheStore>>,
}

impl ServerConfig {
    /// Build the default configuration with environment-derived values
    /// taken from `env`: security-policy origins, session signing keys and
    /// the cookie name.
    pub fn with_env(env: EnvSnapshot) -> Self {
        let helmet = Some(HelmetConfig::derive(&env));

        let mut session = SessionConfig::default();
        if !env.session_keys.is_empty() {
            session.keys = env.session_keys.clone();
        }
        if session.cookie_name.is_none() {
            session.cookie_name = env.cookie_name.clone();
        }

        Self {
            protocol: Protocol::Http,
            host: "0.0.0.0".to_string(),
            port: 3000,
            ssl: None,
            timeout: Some(TimeoutConfig::default()),
            auth: None,
            rate_limit: Some(RateLimitConfig::default()),
            rate_limit_ignored_globs: Vec::new(),
            helmet,
            i18n: None,
            cors: None,
            compress: CompressConfig::default(),
            cache: None,
            cache_responses: None,
            favicon: None,
            build_dir: Some(PathBuf::from("build")),
            serve_static: None,
            views: ViewsConfig::default(),
            meta: HashMap::new(),
            session,
            redirect_loop: Some(RedirectLoopConfig::default()),
            json: JsonConfig::default(),
            csrf: true,
            csrf_ignored_globs: Vec::new(),
            store_ip_address: false,
            observability: ObservabilityConfig::default(),
            env,
            gen_sid: SidGenerator::default(),
            method_override: vec![
                MethodOverrideSource::Header("X-HTTP-Method-Override".to_string()),
                MethodOverrideSource::BodyField("_method".to_string()),
            ],
            passport: None,
            hook_before_setup: None,
            hook_before_routes: None,
            routes: None,
            store: None,
        }
    }

    /// Signing keys after fallback resolution: configured keys, else the
    /// environment-derived list, else the insecure hard-coded default.
    pub fn session_keys(&self) -> Vec<String> {
        if !self.session.keys.is_empty() {
            return self.session.keys.clone();
        }
        if !self.env.session_keys.is_empty() {
            return self.env.session_keys.clone();
        }
        vec![INSECURE_DEFAULT_SESSION_KEY.to_string()]
    }

    /// Session cookie name after fallback resolution.
    pub fn cookie_name(&self) -> String {
        self.session
            .cookie_name
            .clone()
            .or_else(|| self.env.cookie_name.clone())
            .unwrap_or_else(|| "chassis.sid".to_string())
    }

    /// Load a TOML overlay from `path` over the defaults for `env`.
    pub fn from_toml_file(path: impl AsRef<Path>, env: EnvSnapshot) -> Result<Self, Error> {
        crate::config::loader::load_config_with_env(path.as_ref(), env)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_env(EnvSnapshot::default())
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("timeout", &self.timeout)
            .field("auth", &self.auth.is_some())
            .field("rate_limit", &self.rate_limit)
            .field("rate_limit_ignored_globs", &self.rate_limit_ignored_globs)
            .field("helmet", &self.helmet)
            .field("i18n", &self.i18n)
            .field("cors", &self.cors)
            .field("compress", &self.compress)
            .field("cache", &self.cache)
            .field("cache_responses", &self.cache_responses)
            .field("favicon", &self.favicon)
            .field("build_dir", &self.build_dir)
            .field("serve_static", &self.serve_static)
            .field("views", &self.views)
            .field("meta", &self.meta)
            .field("session", &self.session)
            .field("redirect_loop", &self.redirect_loop)
            .field("json", &self.json)
            .field("csrf", &self.csrf)
            .field("csrf_ignored_globs", &self.csrf_ignored_globs)
            .field("store_ip_address", &self.store_ip_address)
            .field("observability", &self.observability)
            .field("env", &self.env)
            .field("method_override", &self.method_override)
            .field("passport", &self.passport.is_some())
            .field("hook_before_setup", &self.hook_before_setup.is_some())
            .field("hook_before_routes", &self.hook_before_routes.is_some())
            .field("routes", &self.routes.is_some())
            .field("store", &self.store.is_some())
            .finish()
    }
}

/// Transport protocol for the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP/1.1.
    #[default]
    Http,
    /// TLS with h2 + http/1.1 ALPN.
    Https,
}

/// TLS material for the `https` protocol.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SslConfig {
    /// Path to the certificate chain (PEM).
    pub cert_path: PathBuf,

    /// Path to the private key (PEM).
    pub key_path: PathBuf,
}

/// Request deadline enforcement.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Seconds before an in-flight request is aborted with 408.
    pub secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { secs: 30 }
    }
}

/// Basic-auth credentials for the pipeline gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,

    /// Realm presented in the `WWW-Authenticate` challenge.
    #[serde(default = "default_realm")]
    pub realm: String,
}

fn default_realm() -> String {
    "restricted".to_string()
}

/// Fixed-window rate limiting.
///
/// Counters live in the cache store (`ratelimit:<client>`), so processes
/// sharing a store share the window.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per window per client.
    pub max: u64,

    /// Window length in seconds.
    pub duration_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max: 100,
            duration_secs: 60,
        }
    }
}

/// Security response headers.
///
/// The interesting part is [`HelmetConfig::derive`]: the CSP directive set
/// can only be built when the environment provides a public host name, so
/// without one `content_security_policy` stays `None` and no CSP header is
/// emitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HelmetConfig {
    /// Content-Security-Policy directives. `None` omits the header.
    pub content_security_policy: Option<CspConfig>,

    /// Emit `Strict-Transport-Security`.
    pub hsts: bool,

    /// HSTS max-age in seconds.
    pub hsts_max_age_secs: u64,

    /// Emit `X-Content-Type-Options: nosniff`.
    pub nosniff: bool,

    /// `X-Frame-Options` value (`DENY` / `SAMEORIGIN`). `None` omits it.
    pub frame_options: Option<String>,

    /// `Referrer-Policy` value. `None` omits it.
    pub referrer_policy: Option<String>,

    /// Emit the legacy `X-XSS-Protection: 1; mode=block`.
    pub xss_filter: bool,
}

impl Default for HelmetConfig {
    fn default() -> Self {
        Self {
            content_security_policy: None,
            hsts: true,
            hsts_max_age_secs: 31_536_000,
            nosniff: true,
            frame_options: Some("SAMEORIGIN".to_string()),
            referrer_policy: Some("no-referrer-when-downgrade".to_string()),
            xss_filter: true,
        }
    }
}

impl HelmetConfig {
    /// Derive the default policy from an environment snapshot.
    ///
    /// With a known web host the CSP allows that host's subdomains (plus
    /// `'self'`) and reports violations to `<web_url>/report`; without one
    /// no sensible CSP exists and the directive set is left empty.
    pub fn derive(env: &EnvSnapshot) -> Self {
        let content_security_policy = env.web_host.as_ref().map(|host| {
            let origin = format!("*.{host}");
            CspConfig {
                default_src: vec!["'self'".to_string(), origin.clone()],
                script_src: vec![
                    "'self'".to_string(),
                    "'unsafe-inline'".to_string(),
                    origin.clone(),
                ],
                style_src: vec![
                    "'self'".to_string(),
                    "'unsafe-inline'".to_string(),
                    origin.clone(),
                ],
                img_src: vec!["'self'".to_string(), "data:".to_string(), origin.clone()],
                connect_src: vec!["'self'".to_string(), origin],
                object_src: vec!["'none'".to_string()],
                report_uri: env
                    .web_url
                    .as_ref()
                    .map(|url| format!("{}/report", url.trim_end_matches('/'))),
            }
        });

        Self {
            content_security_policy,
            ..Self::default()
        }
    }
}

/// Content-Security-Policy directive sources.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CspConfig {
    pub default_src: Vec<String>,
    pub script_src: Vec<String>,
    pub style_src: Vec<String>,
    pub img_src: Vec<String>,
    pub connect_src: Vec<String>,
    pub object_src: Vec<String>,

    /// Violation report endpoint.
    pub report_uri: Option<String>,
}

/// Locale detection and translation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct I18nConfig {
    /// Supported locales; earlier entries win ties.
    pub locales: Vec<String>,

    /// Locale assumed when nothing else matches.
    pub default_locale: String,

    /// Phrase catalogs: locale, then key, then translation.
    pub catalogs: HashMap<String, HashMap<String, String>>,

    /// Remember the detected locale in a cookie.
    pub set_cookie: bool,

    /// Name of the locale cookie.
    pub cookie_name: String,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            locales: vec!["en".to_string()],
            default_locale: "en".to_string(),
            catalogs: HashMap::new(),
            set_cookie: true,
            cookie_name: "locale".to_string(),
        }
    }
}

/// Cross-origin resource sharing policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. Empty means any origin.
    pub allow_origins: Vec<String>,

    /// Allowed methods. Empty falls back to the common verb set.
    pub allow_methods: Vec<String>,

    /// Allowed request headers. Empty mirrors the request.
    pub allow_headers: Vec<String>,

    /// Allow credentialed requests.
    pub allow_credentials: bool,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            allow_methods: Vec::new(),
            allow_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: Some(600),
        }
    }
}

/// Response compression parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressConfig {
    pub enabled: bool,

    /// Brotli.
    pub br: bool,

    pub gzip: bool,

    pub deflate: bool,

    pub zstd: bool,

    /// Encoder effort, 0 (fastest) to 11 (densest). Values outside a
    /// codec's range are clamped by the codec.
    pub quality: u32,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            br: true,
            gzip: true,
            deflate: true,
            zstd: false,
            quality: 4,
        }
    }
}

/// Generic response cache over the cache store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseCacheConfig {
    /// Entry lifetime in seconds.
    pub ttl_secs: u64,

    /// Bodies above this size are never cached.
    pub max_body_bytes: usize,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Named `Cache-Control` rules; the first matching pattern wins.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheControlConfig {
    pub rules: Vec<CacheRule>,
}

/// One `Cache-Control` rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheRule {
    /// Path pattern (exact, trailing `*` prefix, or `^` regex).
    pub pattern: String,

    /// Header value, e.g. `public, max-age=3600`.
    pub value: String,
}

/// Favicon short-circuit settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FaviconConfig {
    /// Icon file read once at construction.
    pub path: PathBuf,

    /// `Cache-Control` max-age for the icon.
    #[serde(default = "default_favicon_max_age")]
    pub max_age_secs: u64,
}

fn default_favicon_max_age() -> u64 {
    86_400
}

/// Static asset mount options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticConfig {
    /// URL prefix assets are served under.
    pub mount: String,

    /// `Cache-Control` max-age for served files.
    pub max_age_secs: u64,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            mount: "/".to_string(),
            max_age_secs: 3600,
        }
    }
}

/// Template lookup root and engine options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// Directory templates are loaded from (recursively).
    pub root: PathBuf,

    /// Template file extension.
    pub extension: String,

    /// Locals merged into every render.
    pub locals: serde_json::Map<String, serde_json::Value>,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("views"),
            extension: "html".to_string(),
            locals: serde_json::Map::new(),
        }
    }
}

/// SEO title/description pair for one path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetaEntry {
    pub title: String,
    pub description: String,
}

/// Session cookie and persistence settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Signing keys, newest first. Empty falls back to the environment
    /// list, then to [`INSECURE_DEFAULT_SESSION_KEY`].
    pub keys: Vec<String>,

    /// Cookie name. `None` falls back to the environment override, then
    /// to `chassis.sid`.
    pub cookie_name: Option<String>,

    /// Session lifetime in seconds.
    pub ttl_secs: u64,

    /// Cookie path.
    pub path: String,

    /// `SameSite` attribute.
    pub same_site: SameSitePolicy,

    /// Mark the cookie `HttpOnly`.
    pub http_only: bool,

    /// Mark the cookie `Secure`. `None` means "when serving https".
    pub secure: Option<bool>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            cookie_name: None,
            ttl_secs: 86_400,
            path: "/".to_string(),
            same_site: SameSitePolicy::Lax,
            http_only: true,
            secure: None,
        }
    }
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

impl From<SameSitePolicy> for cookie::SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => cookie::SameSite::Strict,
            SameSitePolicy::Lax => cookie::SameSite::Lax,
            SameSitePolicy::None => cookie::SameSite::None,
        }
    }
}

/// Redirect-loop detection over the session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectLoopConfig {
    /// Consecutive redirects to the same location tolerated before the
    /// loop is broken by sending the client to `/`.
    pub max_redirects: u32,
}

impl Default for RedirectLoopConfig {
    fn default() -> Self {
        Self { max_redirects: 5 }
    }
}

/// JSON response formatting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JsonConfig {
    /// Re-serialize JSON responses with indentation.
    pub pretty: bool,

    /// Bodies above this size are left untouched.
    pub max_body_bytes: usize,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Observability settings consumed by the host binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Session id generator capability.
///
/// The default returns a 32-character alphanumeric id from the
/// thread-local CSPRNG.
#[derive(Clone)]
pub struct SidGenerator(Arc<dyn Fn() -> String + Send + Sync>);

impl SidGenerator {
    pub fn new(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn generate(&self) -> String {
        (self.0)()
    }
}

impl Default for SidGenerator {
    fn default() -> Self {
        Self::new(|| {
            use rand::distributions::Alphanumeric;
            use rand::Rng;
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(32)
                .map(char::from)
                .collect()
        })
    }
}

impl fmt::Debug for SidGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SidGenerator")
    }
}

/// Router transform capability invoked at a fixed pipeline position.
#[derive(Clone)]
pub struct RouterHook(Arc<dyn Fn(Router) -> Router + Send + Sync>);

impl RouterHook {
    pub fn new(f: impl Fn(Router) -> Router + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub(crate) fn apply(&self, router: Router) -> Router {
        (self.0)(router)
    }
}

impl fmt::Debug for RouterHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RouterHook")
    }
}

/// One method-override extraction source, consulted in order; the first
/// source yielding a verb wins. Only `POST` requests are overridden.
#[derive(Clone)]
pub enum MethodOverrideSource {
    /// Read the verb from a request header.
    Header(String),

    /// Read the verb from a query-string parameter.
    Query(String),

    /// Read the verb from a field of the parsed body.
    BodyField(String),

    /// Arbitrary extraction over the request head and parsed body.
    Custom(Arc<dyn Fn(&Parts, Option<&serde_json::Value>) -> Option<Method> + Send + Sync>),
}

impl fmt::Debug for MethodOverrideSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header(name) => write!(f, "Header({name})"),
            Self::Query(name) => write!(f, "Query({name})"),
            Self::BodyField(name) => write!(f, "BodyField({name})"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Loads the user record referenced by a session for the session-auth
/// integration stage.
#[async_trait::async_trait]
pub trait UserLoader: Send + Sync {
    /// Resolve the stored session value (typically an id) to a user
    /// record. `None` means the session references a user that no longer
    /// exists.
    async fn load_user(&self, id: &serde_json::Value) -> Option<serde_json::Value>;
}

/// Session-auth integration settings.
#[derive(Clone)]
pub struct PassportConfig {
    /// Session key holding the logged-in user reference.
    pub user_key: String,

    /// User lookup capability.
    pub loader: Arc<dyn UserLoader>,
}

impl PassportConfig {
    pub fn new(loader: Arc<dyn UserLoader>) -> Self {
        Self {
            user_key: "passport.user".to_string(),
            loader,
        }
    }
}

impl fmt::Debug for PassportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassportConfig")
            .field("user_key", &self.user_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_http_with_helmet() {
        let config = ServerConfig::default();
        assert_eq!(config.protocol, Protocol::Http);
        let helmet = config.helmet.expect("helmet on by default");
        assert!(helmet.content_security_policy.is_none());
    }

    #[test]
    fn helmet_derivation_requires_a_host() {
        let bare = HelmetConfig::derive(&EnvSnapshot::default());
        assert!(bare.content_security_policy.is_none());

        let env = EnvSnapshot {
            web_host: Some("example.com".to_string()),
            web_url: Some("https://example.com".to_string()),
            ..Default::default()
        };
        let derived = HelmetConfig::derive(&env);
        let csp = derived.content_security_policy.expect("csp with host");
        assert!(csp.default_src.contains(&"*.example.com".to_string()));
        assert_eq!(
            csp.report_uri.as_deref(),
            Some("https://example.com/report")
        );
    }

    #[test]
    fn session_key_fallback_order() {
        let mut config = ServerConfig::default();
        assert_eq!(
            config.session_keys(),
            vec![INSECURE_DEFAULT_SESSION_KEY.to_string()]
        );

        config.env.session_keys = vec!["from-env".to_string()];
        assert_eq!(config.session_keys(), vec!["from-env".to_string()]);

        config.session.keys = vec!["explicit".to_string()];
        assert_eq!(config.session_keys(), vec!["explicit".to_string()]);
    }

    #[test]
    fn cookie_name_fallback_order() {
        let mut config = ServerConfig::default();
        assert_eq!(config.cookie_name(), "chassis.sid");

        config.env.cookie_name = Some("env.sid".to_string());
        assert_eq!(config.cookie_name(), "env.sid");

        config.session.cookie_name = Some("explicit.sid".to_string());
        assert_eq!(config.cookie_name(), "explicit.sid");
    }

    #[test]
    fn default_sid_is_32_alphanumeric() {
        let sid = SidGenerator::default().generate();
        assert_eq!(sid.len(), 32);
        assert!(sid.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn toml_overlay_merges_over_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            protocol = "https"
            port = 8443

            [session]
            ttl_secs = 600
            "#,
        )
        .expect("valid overlay");

        assert_eq!(config.protocol, Protocol::Https);
        assert_eq!(config.port, 8443);
        assert_eq!(config.session.ttl_secs, 600);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.csrf);
    }
}
