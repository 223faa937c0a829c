//! Authorization subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request parts (method, path, headers)
//!     → Authorizer (backend.rs asks the application server)
//!     → Granted(AuthorizeResponse) → proxy target for the streaming proxy
//!     → Denied(DeniedResponse)     → relayed to the client verbatim
//! ```
//!
//! # Design Decisions
//! - The authorizer decides; the gateway never second-guesses a denial
//! - `Service` and `BuildService` decode into one settings type, tagged by kind

pub mod backend;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proxy::settings::{ProxyTargetSettings, TargetKind};

pub use backend::BackendAuthorizer;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization request failed: {0}")]
    Request(String),

    #[error("authorization response timed out")]
    Timeout,

    #[error("failed to read authorization response: {0}")]
    Body(String),

    #[error("failed to decode authorization response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Decoded body of a successful authorization call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    #[serde(rename = "Service", default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ProxyTargetSettings>,

    #[serde(rename = "BuildService", default, skip_serializing_if = "Option::is_none")]
    pub build_service: Option<ProxyTargetSettings>,
}

impl AuthorizeResponse {
    /// The granted target, tagged with the field it came from.
    pub fn into_target(self) -> Option<ProxyTargetSettings> {
        let (mut target, kind) = match (self.service, self.build_service) {
            (Some(target), _) => (target, TargetKind::Service),
            (None, Some(target)) => (target, TargetKind::BuildService),
            (None, None) => return None,
        };
        target.kind = kind;
        Some(target)
    }
}

/// A non-2xx authorization answer, relayed to the client untouched.
#[derive(Debug, Clone)]
pub struct DeniedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for DeniedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[derive(Debug)]
pub enum Authorization {
    Granted(AuthorizeResponse),
    Denied(DeniedResponse),
}

/// Decides per request whether a proxy is permitted and where to.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: &Parts) -> Result<Authorization, AuthError>;
}
