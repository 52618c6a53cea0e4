//! End-to-end behavior of the assembled middleware stages.

mod common;

use axum::routing::{get, put};
use axum::{Json, Router};
use chassis::config::{BasicAuthConfig, CorsConfig, I18nConfig, TimeoutConfig};
use common::{client, spawn_server, test_config};

#[tokio::test]
async fn responses_carry_timing_and_request_id_headers() {
    let (mut server, url) = spawn_server(test_config()).await;

    let res = client().get(format!("{url}/missing")).send().await.unwrap();
    let request_id = res.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(request_id.len(), 36);
    let timing = res
        .headers()
        .get("x-response-time")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(timing.ends_with("ms"));

    server.close().await.unwrap();
}

#[tokio::test]
async fn security_headers_are_applied() {
    let (mut server, url) = spawn_server(test_config()).await;

    let res = client().get(format!("{url}/")).send().await.unwrap();
    assert_eq!(
        res.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(res.headers().get("x-frame-options").unwrap(), "SAMEORIGIN");
    assert!(res.headers().contains_key("referrer-policy"));

    server.close().await.unwrap();
}

#[tokio::test]
async fn trailing_slashes_redirect_permanently() {
    let (mut server, url) = spawn_server(test_config()).await;

    let res = client()
        .get(format!("{url}/about/?q=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 301);
    assert_eq!(res.headers().get("location").unwrap(), "/about?q=1");

    let root = client().get(format!("{url}/")).send().await.unwrap();
    assert_eq!(root.status(), 404);

    server.close().await.unwrap();
}

#[tokio::test]
async fn not_found_negotiates_json_and_text() {
    let (mut server, url) = spawn_server(test_config()).await;

    let res = client()
        .get(format!("{url}/missing"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Not Found");

    let res = client().get(format!("{url}/missing")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "Not Found");

    server.close().await.unwrap();
}

#[tokio::test]
async fn etag_enables_conditional_revalidation() {
    let mut config = test_config();
    config.routes = Some(Router::new().route(
        "/page",
        get(|| async { "a stable page body that never changes" }),
    ));
    let (mut server, url) = spawn_server(config).await;

    let first = client().get(format!("{url}/page")).send().await.unwrap();
    assert_eq!(first.status(), 200);
    let etag = first
        .headers()
        .get("etag")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(etag.starts_with('"'));

    let second = client()
        .get(format!("{url}/page"))
        .header("if-none-match", &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 304);
    assert_eq!(second.headers().get("etag").unwrap().to_str().unwrap(), etag);
    assert_eq!(second.text().await.unwrap(), "");

    server.close().await.unwrap();
}

#[tokio::test]
async fn json_bodies_are_pretty_printed() {
    let mut config = test_config();
    config.routes = Some(Router::new().route(
        "/data",
        get(|| async { Json(serde_json::json!({ "name": "chassis", "tags": ["a", "b"] })) }),
    ));
    let (mut server, url) = spawn_server(config).await;

    let res = client().get(format!("{url}/data")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body = res.text().await.unwrap();
    assert!(body.contains("\n  \"name\""));

    server.close().await.unwrap();
}

#[tokio::test]
async fn slow_handlers_time_out() {
    let mut config = test_config();
    config.timeout = Some(TimeoutConfig { secs: 1 });
    config.routes = Some(Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(3)).await;
            "done"
        }),
    ));
    let (mut server, url) = spawn_server(config).await;

    let res = client().get(format!("{url}/slow")).send().await.unwrap();
    assert_eq!(res.status(), 408);

    server.close().await.unwrap();
}

#[tokio::test]
async fn basic_auth_guards_the_whole_pipeline() {
    let mut config = test_config();
    config.auth = Some(BasicAuthConfig {
        username: "admin".to_string(),
        password: "secret".to_string(),
        realm: "restricted".to_string(),
    });
    let (mut server, url) = spawn_server(config).await;

    let res = client().get(format!("{url}/")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    let challenge = res
        .headers()
        .get("www-authenticate")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(challenge.contains("restricted"));

    let res = client()
        .get(format!("{url}/"))
        .basic_auth("admin", Some("secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client()
        .get(format!("{url}/"))
        .basic_auth("admin", Some("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    server.close().await.unwrap();
}

#[tokio::test]
async fn post_with_method_override_dispatches_to_put() {
    let mut config = test_config();
    config.routes = Some(Router::new().route("/resource", put(|| async { "updated" })));
    let (mut server, url) = spawn_server(config).await;

    let res = client()
        .post(format!("{url}/resource"))
        .form(&[("_method", "PUT")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "updated");

    let res = client()
        .post(format!("{url}/resource"))
        .header("x-http-method-override", "PUT")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "updated");

    server.close().await.unwrap();
}

#[tokio::test]
async fn cors_answers_preflight_and_marks_allowed_origins() {
    let mut config = test_config();
    config.cors = Some(CorsConfig {
        allow_origins: vec!["https://app.example.com".to_string()],
        ..Default::default()
    });
    config.routes = Some(Router::new().route("/data", get(|| async { "payload" })));
    let (mut server, url) = spawn_server(config).await;

    let preflight = client()
        .request(reqwest::Method::OPTIONS, format!("{url}/data"))
        .header("origin", "https://app.example.com")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), 200);
    assert_eq!(
        preflight
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://app.example.com"
    );
    let methods = preflight
        .headers()
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(methods.contains("GET") && methods.contains("DELETE"));

    let res = client()
        .get(format!("{url}/data"))
        .header("origin", "https://app.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers().get("access-control-allow-origin").unwrap(),
        "https://app.example.com"
    );

    let res = client()
        .get(format!("{url}/data"))
        .header("origin", "https://evil.example.com")
        .send()
        .await
        .unwrap();
    assert!(res.headers().get("access-control-allow-origin").is_none());

    server.close().await.unwrap();
}

#[tokio::test]
async fn html_requests_redirect_to_locale_prefixed_paths() {
    let mut config = test_config();
    config.i18n = Some(I18nConfig {
        locales: vec!["en".to_string(), "de".to_string()],
        ..Default::default()
    });
    let (mut server, url) = spawn_server(config).await;

    let res = client()
        .get(format!("{url}/about"))
        .header("accept", "text/html")
        .header("accept-language", "de")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 302);
    assert_eq!(res.headers().get("location").unwrap(), "/de/about");

    let res = client()
        .get(format!("{url}/de/about"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.headers().get("content-language").unwrap(), "de");
    let vary = res.headers().get("vary").unwrap().to_str().unwrap();
    assert!(vary.contains("Accept-Language"));

    server.close().await.unwrap();
}
