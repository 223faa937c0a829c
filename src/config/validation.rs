//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the backend URL and bind address parse
//! - Validate value ranges (timeouts > 0, cache capacity > 0)
//! - Compile route patterns and methods
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::Method;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("backend.url {0:?} is not an absolute http(s) URL")]
    BackendUrl(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("transport.trust_cache_capacity must be greater than zero")]
    ZeroCacheCapacity,

    #[error("route {route:?}: invalid pattern: {reason}")]
    RoutePattern { route: String, reason: String },

    #[error("route {route:?}: invalid method {method:?}")]
    RouteMethod { route: String, method: String },

    #[error("security.internal_headers: invalid header name {0:?}")]
    HeaderName(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match Url::parse(&config.backend.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.push(ValidationError::BackendUrl(config.backend.url.clone())),
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("dial_secs", timeouts.dial_secs),
        ("tls_handshake_secs", timeouts.tls_handshake_secs),
        ("response_header_secs", timeouts.response_header_secs),
        ("backend_response_header_secs", timeouts.backend_response_header_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config.transport.trust_cache_capacity == 0 {
        errors.push(ValidationError::ZeroCacheCapacity);
    }

    for route in &config.routes {
        if let Err(e) = Regex::new(&route.pattern) {
            errors.push(ValidationError::RoutePattern {
                route: route.name.clone(),
                reason: e.to_string(),
            });
        }
        for method in &route.methods {
            if Method::from_bytes(method.as_bytes()).is_err() {
                errors.push(ValidationError::RouteMethod {
                    route: route.name.clone(),
                    method: method.clone(),
                });
            }
        }
    }

    for name in &config.security.internal_headers {
        if axum::http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::HeaderName(name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
