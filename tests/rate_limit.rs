//! Fixed-window rate limiting over the shared store.

mod common;

use axum::routing::get;
use axum::Router;
use chassis::config::RateLimitConfig;
use common::{client, spawn_server, test_config};

#[tokio::test]
async fn requests_over_the_limit_get_429() {
    let mut config = test_config();
    config.rate_limit = Some(RateLimitConfig {
        max: 3,
        duration_secs: 60,
    });
    config.routes = Some(Router::new().route("/ping", get(|| async { "pong" })));
    let (mut server, url) = spawn_server(config).await;

    let c = client();
    for _ in 0..3 {
        let res = c.get(format!("{url}/ping")).send().await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers().get("x-ratelimit-limit").unwrap(), "3");
        assert!(res.headers().contains_key("x-ratelimit-remaining"));
    }

    let res = c.get(format!("{url}/ping")).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert!(res.headers().contains_key("retry-after"));
    assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "0");

    server.close().await.unwrap();
}

#[tokio::test]
async fn ignored_globs_never_rate_limit() {
    let mut config = test_config();
    config.rate_limit = Some(RateLimitConfig {
        max: 2,
        duration_secs: 60,
    });
    config.rate_limit_ignored_globs = vec!["/health*".to_string()];
    config.routes = Some(Router::new().route("/health/live", get(|| async { "ok" })));
    let (mut server, url) = spawn_server(config).await;

    let c = client();
    for _ in 0..20 {
        let res = c.get(format!("{url}/health/live")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    server.close().await.unwrap();
}
