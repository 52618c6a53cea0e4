//! Middleware pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig
//!     → plan() (ordered, config-gated stage list)
//!     → assemble() (fold the plan, innermost first, into an axum Router)
//!
//! Incoming request
//!     → timestamp → timeout → response-time → request-id → logging
//!     → hooks/auth/rate-limit → redirects & headers → caching
//!     → favicon/static → view context → session/flash → body/override
//!     → csrf/passport → routes or not-found fallback
//! ```
//!
//! # Design Decisions
//! - The stage order is a fixed table; config flags only drop rows,
//!   never reorder them
//! - `plan()` is pure so the effective order can be asserted in tests
//!   and logged at startup
//! - `assemble()` walks the plan in reverse because the last layer
//!   added to an axum router is the first to see a request

pub mod assets;
pub mod auth;
pub mod body;
pub mod cache;
pub mod conditional;
pub mod context;
pub mod cors;
pub mod csrf;
pub mod favicon;
pub mod flash;
pub mod helmet;
pub mod i18n;
pub mod logging;
pub mod method_override;
pub mod not_found;
pub mod passport;
pub mod rate_limit;
pub mod redirect_loop;
pub mod request_id;
pub mod seen_ip;
pub mod session;
pub mod slash;
pub mod state;
pub mod timing;
pub mod views;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::middleware;
use axum::{Extension, Router};
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::CompressionLevel;

use crate::config::ServerConfig;
use state::AppState;

/// One row of the pipeline order table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Timestamp,
    Timeout,
    ResponseTime,
    RequestId,
    Logging,
    HookBeforeSetup,
    BasicAuth,
    RateLimit,
    TrailingSlash,
    SecurityHeaders,
    LocaleDetection,
    ConditionalGet,
    Etag,
    Cors,
    Compression,
    ResponseCache,
    CacheRules,
    Favicon,
    StaticAssets,
    Templating,
    AjaxFlag,
    Meta,
    ViewState,
    Session,
    RedirectLoop,
    Flash,
    BodyParsing,
    PrettyJson,
    MethodOverride,
    Csrf,
    Passport,
    SeenIp,
    NotFound,
    HookBeforeRoutes,
    Routes,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Timestamp => "timestamp",
            Stage::Timeout => "timeout",
            Stage::ResponseTime => "response-time",
            Stage::RequestId => "request-id",
            Stage::Logging => "logging",
            Stage::HookBeforeSetup => "hook-before-setup",
            Stage::BasicAuth => "basic-auth",
            Stage::RateLimit => "rate-limit",
            Stage::TrailingSlash => "trailing-slash",
            Stage::SecurityHeaders => "security-headers",
            Stage::LocaleDetection => "locale-detection",
            Stage::ConditionalGet => "conditional-get",
            Stage::Etag => "etag",
            Stage::Cors => "cors",
            Stage::Compression => "compression",
            Stage::ResponseCache => "response-cache",
            Stage::CacheRules => "cache-rules",
            Stage::Favicon => "favicon",
            Stage::StaticAssets => "static-assets",
            Stage::Templating => "templating",
            Stage::AjaxFlag => "ajax-flag",
            Stage::Meta => "meta",
            Stage::ViewState => "view-state",
            Stage::Session => "session",
            Stage::RedirectLoop => "redirect-loop",
            Stage::Flash => "flash",
            Stage::BodyParsing => "body-parsing",
            Stage::PrettyJson => "pretty-json",
            Stage::MethodOverride => "method-override",
            Stage::Csrf => "csrf",
            Stage::Passport => "passport",
            Stage::SeenIp => "seen-ip",
            Stage::NotFound => "not-found",
            Stage::HookBeforeRoutes => "hook-before-routes",
            Stage::Routes => "routes",
        }
    }
}

/// Compute the effective stage list for a configuration.
///
/// The table below is the single source of truth for ordering. A stage
/// appears when its condition holds; nothing else about the order is
/// configurable.
pub fn plan(config: &ServerConfig) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(35);
    let mut push = |stage: Stage, enabled: bool| {
        if enabled {
            stages.push(stage);
        }
    };

    push(Stage::Timestamp, true);
    push(Stage::Timeout, config.timeout.is_some());
    push(Stage::ResponseTime, true);
    push(Stage::RequestId, true);
    push(Stage::Logging, true);
    push(Stage::HookBeforeSetup, config.hook_before_setup.is_some());
    push(Stage::BasicAuth, config.auth.is_some());
    push(Stage::RateLimit, config.rate_limit.is_some());
    push(Stage::TrailingSlash, true);
    push(Stage::SecurityHeaders, config.helmet.is_some());
    push(Stage::LocaleDetection, config.i18n.is_some());
    push(Stage::ConditionalGet, true);
    push(Stage::Etag, true);
    push(Stage::Cors, config.cors.is_some());
    push(Stage::Compression, config.compress.enabled);
    push(Stage::ResponseCache, config.cache.is_some());
    push(Stage::CacheRules, config.cache_responses.is_some());
    push(Stage::Favicon, config.favicon.is_some());
    push(
        Stage::StaticAssets,
        config.build_dir.is_some() && config.serve_static.is_some(),
    );
    push(Stage::Templating, true);
    push(Stage::AjaxFlag, true);
    push(Stage::Meta, !config.meta.is_empty());
    push(Stage::ViewState, true);
    push(Stage::Session, true);
    push(Stage::RedirectLoop, config.redirect_loop.is_some());
    push(Stage::Flash, true);
    push(Stage::BodyParsing, true);
    push(Stage::PrettyJson, true);
    push(Stage::MethodOverride, !config.method_override.is_empty());
    // CSRF drops out entirely under test harnesses, where forms are
    // posted without a browser round-trip to fetch the token.
    push(Stage::Csrf, config.csrf && !config.env.test_mode);
    push(Stage::Passport, config.passport.is_some());
    push(Stage::SeenIp, config.store_ip_address);
    push(Stage::NotFound, true);
    push(Stage::HookBeforeRoutes, config.hook_before_routes.is_some());
    push(Stage::Routes, config.routes.is_some());

    stages
}

/// Fold the stage plan into a router.
///
/// Stages are applied in reverse so the first table row ends up as the
/// outermost layer at runtime.
pub fn assemble(state: Arc<AppState>) -> Router {
    let stages = plan(&state.config);
    let mut router = Router::new();

    for stage in stages.into_iter().rev() {
        router = attach(router, stage, &state);
    }

    // The shared store rides along as an extension so user routes can
    // reach it without threading state through the hook capabilities.
    router.layer(Extension(state.store.clone()))
}

fn attach(router: Router, stage: Stage, state: &Arc<AppState>) -> Router {
    let config = &state.config;
    match stage {
        Stage::Timestamp => router.layer(middleware::from_fn(timing::record_received)),
        Stage::Timeout => {
            let secs = config.timeout.as_ref().map(|t| t.secs).unwrap_or(30);
            router.layer(TimeoutLayer::new(Duration::from_secs(secs)))
        }
        Stage::ResponseTime => router.layer(middleware::from_fn(timing::response_time)),
        Stage::RequestId => {
            // Set must wrap Propagate so the id exists on the request
            // before the response copy happens.
            let router = router.layer(request_id::propagate_layer());
            router.layer(request_id::set_layer())
        }
        Stage::Logging => router.layer(middleware::from_fn(logging::log_requests)),
        Stage::HookBeforeSetup => match &config.hook_before_setup {
            Some(hook) => hook.apply(router),
            None => router,
        },
        Stage::BasicAuth => router.layer(middleware::from_fn_with_state(
            state.clone(),
            auth::basic_auth,
        )),
        Stage::RateLimit => router.layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_requests,
        )),
        Stage::TrailingSlash => {
            router.layer(middleware::from_fn(slash::redirect_trailing_slash))
        }
        Stage::SecurityHeaders => router.layer(middleware::from_fn_with_state(
            state.clone(),
            helmet::apply_security_headers,
        )),
        Stage::LocaleDetection => router.layer(middleware::from_fn_with_state(
            state.clone(),
            i18n::detect_locale,
        )),
        Stage::ConditionalGet => {
            router.layer(middleware::from_fn(conditional::conditional_get))
        }
        Stage::Etag => router.layer(middleware::from_fn(conditional::set_etag)),
        Stage::Cors => match &config.cors {
            Some(cors) => router.layer(cors::cors_layer(cors)),
            None => router,
        },
        Stage::Compression => {
            let compress = &config.compress;
            let layer = CompressionLayer::new()
                .quality(CompressionLevel::Precise(compress.quality as i32))
                .br(compress.br)
                .gzip(compress.gzip)
                .deflate(compress.deflate)
                .zstd(compress.zstd);
            router.layer(layer)
        }
        Stage::ResponseCache => router.layer(middleware::from_fn_with_state(
            state.clone(),
            cache::serve_cached,
        )),
        Stage::CacheRules => router.layer(middleware::from_fn_with_state(
            state.clone(),
            cache::apply_cache_rules,
        )),
        Stage::Favicon => router.layer(middleware::from_fn_with_state(
            state.clone(),
            favicon::serve_favicon,
        )),
        Stage::StaticAssets => router.layer(middleware::from_fn_with_state(
            state.clone(),
            assets::serve_static,
        )),
        Stage::Templating => router.layer(middleware::from_fn_with_state(
            state.clone(),
            views::register_engine,
        )),
        Stage::AjaxFlag => router.layer(middleware::from_fn(context::flag_ajax)),
        Stage::Meta => router.layer(middleware::from_fn_with_state(
            state.clone(),
            context::attach_meta,
        )),
        Stage::ViewState => router.layer(middleware::from_fn_with_state(
            state.clone(),
            context::seed_view_state,
        )),
        Stage::Session => router.layer(middleware::from_fn_with_state(
            state.clone(),
            session::attach_session,
        )),
        Stage::RedirectLoop => router.layer(middleware::from_fn_with_state(
            state.clone(),
            redirect_loop::detect_redirect_loop,
        )),
        Stage::Flash => router.layer(middleware::from_fn(flash::sweep_flash)),
        Stage::BodyParsing => router.layer(middleware::from_fn(body::parse_body)),
        Stage::PrettyJson => router.layer(middleware::from_fn_with_state(
            state.clone(),
            body::pretty_json,
        )),
        Stage::MethodOverride => router.layer(middleware::from_fn_with_state(
            state.clone(),
            method_override::override_method,
        )),
        Stage::Csrf => router.layer(middleware::from_fn_with_state(
            state.clone(),
            csrf::verify_csrf,
        )),
        Stage::Passport => router.layer(middleware::from_fn_with_state(
            state.clone(),
            passport::load_current_user,
        )),
        Stage::SeenIp => router.layer(middleware::from_fn_with_state(
            state.clone(),
            seen_ip::persist_seen_ip,
        )),
        Stage::NotFound => {
            let fallback_state = state.clone();
            router.fallback(move |req: Request| {
                let state = fallback_state.clone();
                async move { not_found::handle_not_found(state, req).await }
            })
        }
        Stage::HookBeforeRoutes => match &config.hook_before_routes {
            Some(hook) => hook.apply(router),
            None => router,
        },
        Stage::Routes => match &config.routes {
            Some(routes) => router.merge(routes.clone()),
            None => router,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvSnapshot, I18nConfig};
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::util::ServiceExt;

    fn position(stages: &[Stage], stage: Stage) -> usize {
        stages
            .iter()
            .position(|s| *s == stage)
            .unwrap_or_else(|| panic!("{} missing from plan", stage.name()))
    }

    #[test]
    fn default_plan_starts_with_timing_and_ends_with_not_found() {
        let stages = plan(&ServerConfig::default());
        assert_eq!(stages.first(), Some(&Stage::Timestamp));
        assert_eq!(stages.last(), Some(&Stage::NotFound));
    }

    #[test]
    fn default_plan_gates_optional_stages() {
        let config = ServerConfig::default();
        let stages = plan(&config);

        assert!(stages.contains(&Stage::Timeout));
        assert!(stages.contains(&Stage::RateLimit));
        assert!(stages.contains(&Stage::SecurityHeaders));
        assert!(stages.contains(&Stage::Csrf));
        assert!(stages.contains(&Stage::MethodOverride));

        assert!(!stages.contains(&Stage::LocaleDetection));
        assert!(!stages.contains(&Stage::Cors));
        assert!(!stages.contains(&Stage::BasicAuth));
        assert!(!stages.contains(&Stage::Routes));
        assert!(!stages.contains(&Stage::SeenIp));
    }

    #[test]
    fn relative_order_is_fixed() {
        let mut config = ServerConfig::default();
        config.i18n = Some(I18nConfig::default());
        let stages = plan(&config);

        assert!(position(&stages, Stage::Timestamp) < position(&stages, Stage::Logging));
        assert!(
            position(&stages, Stage::SecurityHeaders)
                < position(&stages, Stage::LocaleDetection)
        );
        assert!(position(&stages, Stage::ConditionalGet) < position(&stages, Stage::Etag));
        assert!(position(&stages, Stage::Session) < position(&stages, Stage::Flash));
        assert!(position(&stages, Stage::Session) < position(&stages, Stage::RedirectLoop));
        assert!(position(&stages, Stage::BodyParsing) < position(&stages, Stage::MethodOverride));
        assert!(position(&stages, Stage::MethodOverride) < position(&stages, Stage::Csrf));
        assert!(position(&stages, Stage::Csrf) < position(&stages, Stage::NotFound));
    }

    #[test]
    fn test_mode_drops_csrf() {
        let env = EnvSnapshot {
            test_mode: true,
            ..EnvSnapshot::default()
        };
        let stages = plan(&ServerConfig::with_env(env));
        assert!(!stages.contains(&Stage::Csrf));
    }

    #[tokio::test]
    async fn assembled_router_serves_the_fallback() {
        let state = AppState::from_config(ServerConfig::default()).unwrap();
        let router = assemble(Arc::new(state));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/nowhere")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(response.headers().contains_key("x-response-time"));
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
    }
}
