//! Gateway error taxonomy.
//!
//! Every failure that reaches a client is resolved here into a status code
//! and body. Authorization denials are not errors: the authorizer's own
//! response is relayed untouched (see `auth::Authorization::Denied`).
//!
//! | Variant                               | Status |
//! |---------------------------------------|--------|
//! | `MissingSettings`, `MalformedUrl`,    | 500    |
//! | `UnsupportedScheme`, `Authorization`  |        |
//! | `Transport`                           | 503    |
//! | `Upstream`                            | 502    |
//! | `NoRouteMatched`                      | 403    |
//! | `PrefixMismatch`                      | 404    |
//! | `WildcardTarget`, `ConnectNotAllowed` | 400    |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::proxy::settings::SettingsError;

/// Body sent for every 500 so no internal detail leaks to the client.
pub const INTERNAL_ERROR_BODY: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("proxy target not specified")]
    MissingSettings,

    #[error("invalid proxy target URL")]
    MalformedUrl,

    #[error("invalid proxy target scheme: {0:?}")]
    UnsupportedScheme(String),

    #[error("authorization request failed: {0}")]
    Authorization(String),

    #[error("{0}")]
    Transport(String),

    #[error("backend request failed: {0}")]
    Upstream(String),

    #[error("Forbidden")]
    NoRouteMatched,

    #[error("Not found {0:?}")]
    PrefixMismatch(String),

    #[error("Connection upgrade not allowed")]
    WildcardTarget,

    #[error("CONNECT not allowed")]
    ConnectNotAllowed,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingSettings
            | GatewayError::MalformedUrl
            | GatewayError::UnsupportedScheme(_)
            | GatewayError::Authorization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NoRouteMatched => StatusCode::FORBIDDEN,
            GatewayError::PrefixMismatch(_) => StatusCode::NOT_FOUND,
            GatewayError::WildcardTarget | GatewayError::ConnectNotAllowed => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl From<SettingsError> for GatewayError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::MissingSettings => GatewayError::MissingSettings,
            SettingsError::MalformedUrl => GatewayError::MalformedUrl,
            SettingsError::UnsupportedScheme(scheme) => GatewayError::UnsupportedScheme(scheme),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Internal error");
            return (status, INTERNAL_ERROR_BODY).into_response();
        }

        tracing::debug!(status = %status, error = %self, "Request rejected");
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::MissingSettings.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            GatewayError::UnsupportedScheme("ws".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::Transport("connection refused".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(GatewayError::NoRouteMatched.status(), StatusCode::FORBIDDEN);
        assert_eq!(GatewayError::PrefixMismatch("/x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(GatewayError::WildcardTarget.status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::ConnectNotAllowed.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_internal_errors_hide_detail() {
        let response = GatewayError::UnsupportedScheme("wss".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], INTERNAL_ERROR_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_transport_error_exposes_message() {
        let response = GatewayError::Transport("dial tcp: connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"dial tcp: connection refused");
    }
}
