//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check cross-field requirements (https requires TLS material)
//! - Validate value ranges (timeouts > 0, compression quality in range)
//! - Compile path patterns so bad globs fail before the server exists
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs at construction, before any listener binds

use std::fmt;

use crate::config::schema::{Protocol, ServerConfig};
use crate::pathmatch::PathMatcher;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,

    /// Human-readable description of the problem.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.trim().is_empty() {
        errors.push(ValidationError::new("host", "must not be empty"));
    }

    match (&config.protocol, &config.ssl) {
        (Protocol::Https, None) => {
            errors.push(ValidationError::new(
                "ssl",
                "required when protocol is https",
            ));
        }
        (_, Some(ssl)) => {
            if ssl.cert_path.as_os_str().is_empty() {
                errors.push(ValidationError::new("ssl.cert_path", "must not be empty"));
            }
            if ssl.key_path.as_os_str().is_empty() {
                errors.push(ValidationError::new("ssl.key_path", "must not be empty"));
            }
        }
        _ => {}
    }

    if let Some(timeout) = &config.timeout {
        if timeout.secs == 0 {
            errors.push(ValidationError::new("timeout.secs", "must be > 0"));
        }
    }

    if let Some(auth) = &config.auth {
        if auth.username.is_empty() {
            errors.push(ValidationError::new("auth.username", "must not be empty"));
        }
    }

    if let Some(rate_limit) = &config.rate_limit {
        if rate_limit.max == 0 {
            errors.push(ValidationError::new("rate_limit.max", "must be > 0"));
        }
        if rate_limit.duration_secs == 0 {
            errors.push(ValidationError::new(
                "rate_limit.duration_secs",
                "must be > 0",
            ));
        }
    }

    if let Some(cors) = &config.cors {
        let wildcard =
            cors.allow_origins.is_empty() || cors.allow_origins.iter().any(|o| o == "*");
        if cors.allow_credentials && wildcard {
            errors.push(ValidationError::new(
                "cors.allow_origins",
                "must be explicit when allow_credentials is set",
            ));
        }
        for (i, origin) in cors.allow_origins.iter().enumerate() {
            if origin.parse::<axum::http::HeaderValue>().is_err() {
                errors.push(ValidationError::new(
                    format!("cors.allow_origins[{i}]"),
                    "not a valid header value",
                ));
            }
        }
    }

    if !(0..=11).contains(&config.compress.quality) {
        errors.push(ValidationError::new(
            "compress.quality",
            "must be between 0 and 11",
        ));
    }

    if let Some(i18n) = &config.i18n {
        if i18n.locales.is_empty() {
            errors.push(ValidationError::new("i18n.locales", "must not be empty"));
        } else if !i18n.locales.contains(&i18n.default_locale) {
            errors.push(ValidationError::new(
                "i18n.default_locale",
                format!("'{}' is not in i18n.locales", i18n.default_locale),
            ));
        }
    }

    if config.views.extension.is_empty() || config.views.extension.starts_with('.') {
        errors.push(ValidationError::new(
            "views.extension",
            "must be a bare extension without the leading dot",
        ));
    }

    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::new("session.ttl_secs", "must be > 0"));
    }
    for (i, key) in config.session.keys.iter().enumerate() {
        if key.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("session.keys[{i}]"),
                "must not be blank",
            ));
        }
    }

    if let Some(redirect_loop) = &config.redirect_loop {
        if redirect_loop.max_redirects == 0 {
            errors.push(ValidationError::new(
                "redirect_loop.max_redirects",
                "must be > 0",
            ));
        }
    }

    if let Some(cache) = &config.cache {
        if cache.ttl_secs == 0 {
            errors.push(ValidationError::new("cache.ttl_secs", "must be > 0"));
        }
        if cache.max_body_bytes == 0 {
            errors.push(ValidationError::new("cache.max_body_bytes", "must be > 0"));
        }
    }

    check_patterns(
        "rate_limit_ignored_globs",
        &config.rate_limit_ignored_globs,
        &mut errors,
    );
    check_patterns("csrf_ignored_globs", &config.csrf_ignored_globs, &mut errors);

    if let Some(cache_responses) = &config.cache_responses {
        let patterns: Vec<String> = cache_responses
            .rules
            .iter()
            .map(|rule| rule.pattern.clone())
            .collect();
        check_patterns("cache_responses.rules", &patterns, &mut errors);
    }

    for path in config.meta.keys() {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("meta[{path}]"),
                "path must start with '/'",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_patterns(field: &str, patterns: &[String], errors: &mut Vec<ValidationError>) {
    for (i, pattern) in patterns.iter().enumerate() {
        if let Err(message) = PathMatcher::parse(pattern) {
            errors.push(ValidationError::new(format!("{field}[{i}]"), message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SslConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn https_without_ssl_is_rejected() {
        let config = ServerConfig {
            protocol: Protocol::Https,
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "ssl"));
    }

    #[test]
    fn https_with_ssl_passes() {
        let config = ServerConfig {
            protocol: Protocol::Https,
            ssl: Some(SslConfig {
                cert_path: "certs/server.pem".into(),
                key_path: "certs/server.key".into(),
            }),
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = ServerConfig {
            protocol: Protocol::Https,
            ..Default::default()
        };
        config.csrf_ignored_globs = vec!["^[invalid".to_string()];
        config.session.ttl_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3, "got: {errors:?}");
        assert!(errors.iter().any(|e| e.field == "ssl"));
        assert!(errors.iter().any(|e| e.field == "csrf_ignored_globs[0]"));
        assert!(errors.iter().any(|e| e.field == "session.ttl_secs"));
    }

    #[test]
    fn bad_default_locale_is_rejected() {
        let mut config = ServerConfig::default();
        config.i18n = Some(crate::config::schema::I18nConfig {
            locales: vec!["en".to_string(), "de".to_string()],
            default_locale: "fr".to_string(),
            ..Default::default()
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "i18n.default_locale"));
    }
}
