//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The application server that authorizes requests and serves the rest.
    pub backend: BackendConfig,

    /// Ordered route table. Empty means the built-in table.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Outbound transport settings.
    pub transport: TransportConfig,

    /// Security hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8181").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8181".to_string(),
        }
    }
}

/// Application server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL. Its path is the relative URL root the gateway serves under.
    pub url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
        }
    }
}

/// Handler a route dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteHandlerKind {
    /// Authorize with the backend, then stream to the granted target.
    ServiceProxy,
    /// Forward unchanged to the backend.
    Backend,
}

/// A route table entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Methods to match. Empty matches every method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Regex matched against the path with the URL prefix stripped.
    pub pattern: String,

    /// Handler to dispatch to.
    pub handler: RouteHandlerKind,
}

/// Timeouts for outbound calls, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TCP connect timeout.
    pub dial_secs: u64,

    /// TLS handshake timeout, on top of the dial timeout.
    pub tls_handshake_secs: u64,

    /// Time allowed for proxy targets to send headers, counted from the end
    /// of the request body.
    pub response_header_secs: u64,

    /// Time allowed for the backend to send headers, both on forwarded
    /// requests and on authorization calls.
    pub backend_response_header_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dial_secs: 30,
            tls_handshake_secs: 10,
            response_header_secs: 30,
            backend_response_header_secs: 300,
        }
    }
}

/// Outbound connection pooling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum number of distinct trust pools kept with their own client.
    pub trust_cache_capacity: usize,

    /// Idle pooled connections are closed after this many seconds.
    pub pool_idle_secs: u64,

    /// Idle connections kept per host.
    pub max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            trust_cache_capacity: 16,
            pool_idle_secs: 90,
            max_idle_per_host: 32,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Gateway-internal headers removed from every inbound request.
    pub internal_headers: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            internal_headers: vec![crate::security::headers::REWRITTEN_FIELDS_HEADER.to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9229".to_string(),
        }
    }
}
