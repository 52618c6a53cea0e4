//! Cross-origin resource sharing.
//!
//! Thin translation from configuration to tower-http's `CorsLayer`.
//! Validation has already rejected the credentials-with-wildcard
//! combination the layer refuses at runtime.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::schema::CorsConfig;

pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new();

    // A "*" entry means any origin, as does an empty list. `AllowOrigin::list`
    // refuses the literal wildcard.
    let any_origin =
        config.allow_origins.is_empty() || config.allow_origins.iter().any(|o| o == "*");
    if any_origin {
        layer = layer.allow_origin(AllowOrigin::any());
    } else {
        let origins: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer = layer.allow_origin(AllowOrigin::list(origins));
    }

    let methods: Vec<Method> = if config.allow_methods.is_empty() {
        vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ]
    } else {
        config
            .allow_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect()
    };
    layer = layer.allow_methods(AllowMethods::list(methods));

    if config.allow_headers.is_empty() {
        layer = layer.allow_headers(AllowHeaders::mirror_request());
    } else {
        let headers: Vec<HeaderName> = config
            .allow_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        layer = layer.allow_headers(AllowHeaders::list(headers));
    }

    if config.allow_credentials {
        layer = layer.allow_credentials(true);
    }
    if let Some(max_age) = config.max_age_secs {
        layer = layer.max_age(Duration::from_secs(max_age));
    }

    layer
}
