//! Static content, caching and template rendering.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use chassis::config::{
    CacheControlConfig, CacheRule, FaviconConfig, MetaEntry, ResponseCacheConfig, StaticConfig,
};
use chassis::Render;
use common::{client, spawn_server, test_config};

#[tokio::test]
async fn the_favicon_short_circuits_with_cache_headers() {
    let dir = tempfile::tempdir().unwrap();
    let icon = dir.path().join("favicon.ico");
    std::fs::write(&icon, [0u8, 1, 2, 3]).unwrap();

    let mut config = test_config();
    config.favicon = Some(FaviconConfig {
        path: icon,
        max_age_secs: 86400,
    });
    let (mut server, url) = spawn_server(config).await;

    let res = client()
        .get(format!("{url}/favicon.ico"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers().get("content-type").unwrap(), "image/x-icon");
    assert_eq!(
        res.headers().get("cache-control").unwrap(),
        "public, max-age=86400"
    );
    assert_eq!(res.bytes().await.unwrap().as_ref(), [0u8, 1, 2, 3]);

    let res = client()
        .post(format!("{url}/favicon.ico"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 405);
    assert_eq!(res.headers().get("allow").unwrap(), "GET, HEAD");

    server.close().await.unwrap();
}

#[tokio::test]
async fn static_assets_serve_from_the_build_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log(1);").unwrap();

    let mut config = test_config();
    config.build_dir = Some(dir.path().to_path_buf());
    config.serve_static = Some(StaticConfig {
        mount: "/assets".to_string(),
        max_age_secs: 3600,
    });
    let (mut server, url) = spawn_server(config).await;

    let res = client()
        .get(format!("{url}/assets/app.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers().get("cache-control").unwrap(),
        "public, max-age=3600"
    );
    assert_eq!(res.text().await.unwrap(), "console.log(1);");

    // A miss falls through to the rest of the pipeline.
    let res = client()
        .get(format!("{url}/assets/nope.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "Not Found");

    server.close().await.unwrap();
}

#[tokio::test]
async fn the_response_cache_replays_and_marks_hits() {
    let generation = Arc::new(AtomicUsize::new(0));
    let counter = generation.clone();

    let mut config = test_config();
    config.cache = Some(ResponseCacheConfig::default());
    config.routes = Some(Router::new().route(
        "/page",
        get(move || {
            let counter = counter.clone();
            async move { format!("generation {}", counter.fetch_add(1, Ordering::SeqCst)) }
        }),
    ));
    let (mut server, url) = spawn_server(config).await;

    let first = client().get(format!("{url}/page")).send().await.unwrap();
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    assert_eq!(first.text().await.unwrap(), "generation 0");

    let second = client().get(format!("{url}/page")).send().await.unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");
    assert_eq!(second.text().await.unwrap(), "generation 0");

    // The handler ran exactly once.
    assert_eq!(generation.load(Ordering::SeqCst), 1);

    server.close().await.unwrap();
}

#[tokio::test]
async fn cache_control_rules_apply_by_pattern() {
    let mut config = test_config();
    config.cache_responses = Some(CacheControlConfig {
        rules: vec![CacheRule {
            pattern: "/api/*".to_string(),
            value: "no-store".to_string(),
        }],
    });
    config.routes = Some(Router::new().route("/api/data", get(|| async { "payload" })));
    let (mut server, url) = spawn_server(config).await;

    let res = client()
        .get(format!("{url}/api/data"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers().get("cache-control").unwrap(), "no-store");

    let res = client().get(format!("{url}/other")).send().await.unwrap();
    assert!(res.headers().get("cache-control").is_none());

    server.close().await.unwrap();
}

#[tokio::test]
async fn templates_render_with_locals_and_meta() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("hello.html"),
        "<h1>{{ meta.title }}</h1><p>Hi {{ name }} at {{ path }}</p>",
    )
    .unwrap();

    async fn hello(render: Render) -> axum::response::Response {
        render.render("hello")
    }

    let mut config = test_config();
    config.views.root = dir.path().to_path_buf();
    config
        .views
        .locals
        .insert("name".to_string(), serde_json::json!("world"));
    config.meta.insert(
        "/hello".to_string(),
        MetaEntry {
            title: "Welcome".to_string(),
            description: "greeting page".to_string(),
        },
    );
    config.routes = Some(Router::new().route("/hello", get(hello)));
    let (mut server, url) = spawn_server(config).await;

    let res = client().get(format!("{url}/hello")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body = res.text().await.unwrap();
    assert!(body.contains("<h1>Welcome</h1>"));
    assert!(body.contains("Hi world at /hello"));

    server.close().await.unwrap();
}
