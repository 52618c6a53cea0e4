//! Security response headers.
//!
//! Header pairs are assembled once from configuration; per-request work is
//! a handful of map inserts. The middleware overrides handler-set values
//! so the configured policy is authoritative.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::schema::{CspConfig, HelmetConfig};
use crate::error::{Error, Result};
use crate::pipeline::state::AppState;

pub async fn apply_security_headers(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    for (name, value) in &state.helmet_headers {
        headers.insert(name.clone(), value.clone());
    }
    res
}

/// Turn the configured policy into concrete header pairs.
pub(crate) fn build_headers(config: &HelmetConfig) -> Result<Vec<(HeaderName, HeaderValue)>> {
    let mut headers = Vec::new();

    if let Some(csp) = &config.content_security_policy {
        let value = csp_value(csp);
        headers.push((
            header::CONTENT_SECURITY_POLICY,
            parse_value("content_security_policy", &value)?,
        ));
    }

    if config.hsts {
        let value = format!("max-age={}; includeSubDomains", config.hsts_max_age_secs);
        headers.push((
            header::STRICT_TRANSPORT_SECURITY,
            parse_value("hsts", &value)?,
        ));
    }

    if config.nosniff {
        headers.push((
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));
    }

    if let Some(frame_options) = &config.frame_options {
        headers.push((
            header::X_FRAME_OPTIONS,
            parse_value("frame_options", frame_options)?,
        ));
    }

    if let Some(referrer_policy) = &config.referrer_policy {
        headers.push((
            header::REFERRER_POLICY,
            parse_value("referrer_policy", referrer_policy)?,
        ));
    }

    if config.xss_filter {
        headers.push((
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ));
    }

    Ok(headers)
}

fn parse_value(field: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::config(format!("helmet.{field}"), "not a valid header value"))
}

fn csp_value(csp: &CspConfig) -> String {
    let mut directives = Vec::new();
    push_directive(&mut directives, "default-src", &csp.default_src);
    push_directive(&mut directives, "script-src", &csp.script_src);
    push_directive(&mut directives, "style-src", &csp.style_src);
    push_directive(&mut directives, "img-src", &csp.img_src);
    push_directive(&mut directives, "connect-src", &csp.connect_src);
    push_directive(&mut directives, "object-src", &csp.object_src);
    if let Some(report_uri) = &csp.report_uri {
        directives.push(format!("report-uri {report_uri}"));
    }
    directives.join("; ")
}

fn push_directive(directives: &mut Vec<String>, name: &str, sources: &[String]) {
    if !sources.is_empty() {
        directives.push(format!("{name} {}", sources.join(" ")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::EnvSnapshot;

    #[test]
    fn default_policy_has_no_csp_header() {
        let headers = build_headers(&HelmetConfig::default()).unwrap();
        assert!(headers
            .iter()
            .all(|(name, _)| name != header::CONTENT_SECURITY_POLICY));
        assert!(headers
            .iter()
            .any(|(name, _)| *name == header::X_CONTENT_TYPE_OPTIONS));
    }

    #[test]
    fn derived_policy_emits_csp() {
        let env = EnvSnapshot {
            web_host: Some("example.com".to_string()),
            ..Default::default()
        };
        let headers = build_headers(&HelmetConfig::derive(&env)).unwrap();
        let csp = headers
            .iter()
            .find(|(name, _)| *name == header::CONTENT_SECURITY_POLICY)
            .map(|(_, value)| value.to_str().unwrap().to_string())
            .unwrap();
        assert!(csp.contains("default-src 'self' *.example.com"));
        assert!(csp.contains("object-src 'none'"));
    }

    #[test]
    fn invalid_values_are_construction_errors() {
        let config = HelmetConfig {
            frame_options: Some("bad\nvalue".to_string()),
            ..Default::default()
        };
        assert!(build_headers(&config).is_err());
    }
}
