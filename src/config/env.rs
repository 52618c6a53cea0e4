//! Environment snapshot.
//!
//! Every environment-derived default flows through [`EnvSnapshot`], captured
//! once and passed explicitly into the derivation code. Nothing else in the
//! crate reads `std::env`, which keeps construction deterministic and lets
//! tests inject any environment they like.

use std::env;

/// A one-shot capture of the environment variables the server consults.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    /// Public host name (e.g. `example.com`). Content-Security-Policy
    /// origins cannot be derived without it.
    pub web_host: Option<String>,

    /// Public base URL (e.g. `https://example.com`), used to build the CSP
    /// report endpoint.
    pub web_url: Option<String>,

    /// Session signing keys, newest first.
    pub session_keys: Vec<String>,

    /// Session cookie name override.
    pub cookie_name: Option<String>,

    /// Trust `X-Forwarded-*` headers from a fronting proxy.
    pub trust_proxy: bool,

    /// Test mode disables CSRF enforcement.
    pub test_mode: bool,
}

impl EnvSnapshot {
    /// Read the process environment once.
    ///
    /// Recognized variables: `WEB_HOST`, `WEB_URL`, `SESSION_KEYS`
    /// (comma-separated), `COOKIE_NAME`, `TRUST_PROXY`, `TEST_MODE`.
    pub fn capture() -> Self {
        Self {
            web_host: read("WEB_HOST"),
            web_url: read("WEB_URL"),
            session_keys: read("SESSION_KEYS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            cookie_name: read("COOKIE_NAME"),
            trust_proxy: read_flag("TRUST_PROXY"),
            test_mode: read_flag("TEST_MODE"),
        }
    }
}

fn read(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_flag(name: &str) -> bool {
    matches!(
        env::var(name).unwrap_or_default().trim(),
        "1" | "true" | "TRUE" | "yes" | "on"
    )
}
