//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::time::Duration;

use chassis::{EnvSnapshot, ServerConfig, WebServer};

/// Environment snapshot used by most tests: test mode on, so CSRF
/// enforcement drops out unless a test opts back in.
pub fn test_env() -> EnvSnapshot {
    EnvSnapshot {
        test_mode: true,
        ..EnvSnapshot::default()
    }
}

/// Baseline configuration for integration tests.
pub fn test_config() -> ServerConfig {
    ServerConfig::with_env(test_env())
}

/// Assemble the config and bind it on an ephemeral loopback port.
///
/// Returns the server (so the test can close it) and a base URL.
pub async fn spawn_server(config: ServerConfig) -> (WebServer, String) {
    let mut server = WebServer::new(config).unwrap();
    server.set_shutdown_grace(Duration::from_secs(2));
    let addr = server.listen_on(0, "127.0.0.1").await.unwrap();
    (server, format!("http://{addr}"))
}

/// Plain client: no cookies, no automatic redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Cookie-jar client for session flows; still no automatic redirects.
pub fn cookie_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
