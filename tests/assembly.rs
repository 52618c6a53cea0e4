//! Construction and pipeline-plan behavior.

mod common;

use std::sync::Arc;

use axum::routing::get;
use axum::{Extension, Router};
use chassis::config::{HelmetConfig, Protocol, RouterHook};
use chassis::{plan, CacheStore, EnvSnapshot, Error, ServerConfig, Stage, WebServer};
use common::{client, spawn_server, test_config};

#[test]
fn csp_is_absent_without_a_web_host() {
    let helmet = HelmetConfig::derive(&EnvSnapshot::default());
    assert!(helmet.content_security_policy.is_none());
}

#[test]
fn csp_is_derived_from_the_web_host() {
    let env = EnvSnapshot {
        web_host: Some("example.com".to_string()),
        web_url: Some("https://www.example.com".to_string()),
        ..EnvSnapshot::default()
    };
    let csp = HelmetConfig::derive(&env).content_security_policy.unwrap();

    assert!(csp.default_src.contains(&"*.example.com".to_string()));
    assert_eq!(
        csp.report_uri.as_deref(),
        Some("https://www.example.com/report")
    );
}

#[test]
fn https_without_ssl_material_fails_construction() {
    let mut config = test_config();
    config.protocol = Protocol::Https;
    config.ssl = None;

    let err = WebServer::new(config)
        .err()
        .expect("https without ssl must fail construction");
    match err {
        Error::Config(errors) => {
            assert!(errors.iter().any(|e| e.field == "ssl"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn plan_order_invariants_hold() {
    let mut config = test_config();
    config.i18n = Some(Default::default());
    config.routes = Some(Router::new());
    let stages = plan(&config);
    let pos = |stage: Stage| {
        stages
            .iter()
            .position(|s| *s == stage)
            .unwrap_or_else(|| panic!("{} missing", stage.name()))
    };

    assert_eq!(stages[0], Stage::Timestamp);
    assert!(pos(Stage::Session) < pos(Stage::Flash));
    assert!(pos(Stage::SecurityHeaders) < pos(Stage::LocaleDetection));
    assert!(pos(Stage::ConditionalGet) < pos(Stage::Etag));
    assert!(pos(Stage::MethodOverride) < pos(Stage::Routes));
}

#[tokio::test]
async fn default_protocol_serves_plain_http11() {
    let (mut server, url) = spawn_server(test_config()).await;

    let res = client()
        .get(format!("{url}/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(format!("{:?}", res.version()), "HTTP/1.1");
    assert_eq!(res.status(), 404);

    server.close().await.unwrap();
}

#[tokio::test]
async fn hooks_can_mount_routes() {
    let mut config = test_config();
    config.hook_before_routes = Some(RouterHook::new(|router| {
        router.route("/hooked", get(|| async { "hooked" }))
    }));

    let (mut server, url) = spawn_server(config).await;
    let res = client().get(format!("{url}/hooked")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "hooked");

    server.close().await.unwrap();
}

#[tokio::test]
async fn the_store_is_shared_between_instance_and_requests() {
    async fn stash(Extension(store): Extension<Arc<dyn CacheStore>>) -> &'static str {
        store
            .set("cache:greeting", b"hello".to_vec(), None)
            .await
            .unwrap();
        "stored"
    }

    let mut config = test_config();
    config.routes = Some(Router::new().route("/stash", get(stash)));

    let (mut server, url) = spawn_server(config).await;
    let res = client().get(format!("{url}/stash")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let value = server.store().get("cache:greeting").await.unwrap();
    assert_eq!(value.as_deref(), Some(b"hello".as_slice()));

    server.close().await.unwrap();
}
