//! Authorization through the application server.
//!
//! The inbound request is replayed without its body to `<path>/authorize` on
//! the backend. A 2xx answer carries the proxy target as JSON; anything else
//! is the denial the client gets.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, request::Parts, HeaderValue, Request, Uri},
};

use crate::auth::{AuthError, Authorization, AuthorizeResponse, Authorizer, DeniedResponse};
use crate::proxy::body::{send_with_header_timeout, CallError};
use crate::proxy::transport::ProxyClient;
use crate::security::remove_hop_by_hop;

/// Marks calls the backend must answer with gateway instructions.
pub const API_REQUEST_HEADER: &str = "gateway-api-request";

/// Upper bound for authorization bodies, granted or denied.
const MAX_AUTH_BODY: usize = 1024 * 1024;

pub struct BackendAuthorizer {
    client: ProxyClient,
    backend: Uri,
    timeout: Duration,
}

impl BackendAuthorizer {
    /// `backend` supplies scheme and authority; the path comes from the request.
    pub fn new(client: ProxyClient, backend: Uri, timeout: Duration) -> Self {
        Self {
            client,
            backend,
            timeout,
        }
    }

    fn authorize_uri(&self, request: &Parts) -> Result<Uri, AuthError> {
        let path = request.uri.path().trim_end_matches('/');
        let path_and_query = match request.uri.query() {
            Some(query) => format!("{path}/authorize?{query}"),
            None => format!("{path}/authorize"),
        };

        let mut parts = self.backend.clone().into_parts();
        parts.path_and_query = Some(
            path_and_query
                .parse()
                .map_err(|e| AuthError::Request(format!("invalid authorize path: {e}")))?,
        );
        Uri::from_parts(parts).map_err(|e| AuthError::Request(e.to_string()))
    }

    fn build_request(&self, request: &Parts) -> Result<Request<Body>, AuthError> {
        let mut outbound = Request::builder()
            .method(request.method.clone())
            .uri(self.authorize_uri(request)?)
            .body(Body::empty())
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let headers = outbound.headers_mut();
        *headers = request.headers.clone();
        remove_hop_by_hop(headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        headers.insert(API_REQUEST_HEADER, HeaderValue::from_static("true"));

        Ok(outbound)
    }
}

#[async_trait]
impl Authorizer for BackendAuthorizer {
    async fn authorize(&self, request: &Parts) -> Result<Authorization, AuthError> {
        let outbound = self.build_request(request)?;
        tracing::debug!(uri = %outbound.uri(), "Authorizing request with backend");

        let response = match send_with_header_timeout(&self.client, outbound, self.timeout).await {
            Ok(response) => response,
            Err(CallError::HeaderTimeout(_)) => return Err(AuthError::Timeout),
            Err(e) => return Err(AuthError::Request(e.to_string())),
        };

        let (mut parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), MAX_AUTH_BODY)
            .await
            .map_err(|e| AuthError::Body(e.to_string()))?;

        if !parts.status.is_success() {
            tracing::info!(status = %parts.status, "Authorization denied");
            remove_hop_by_hop(&mut parts.headers);
            return Ok(Authorization::Denied(DeniedResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            }));
        }

        let granted: AuthorizeResponse = serde_json::from_slice(&body)?;
        Ok(Authorization::Granted(granted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TimeoutConfig, TransportConfig};
    use crate::proxy::transport::{TransportPool, TransportTimeouts};

    fn authorizer() -> BackendAuthorizer {
        let pool = TransportPool::new(
            TransportTimeouts::from(&TimeoutConfig::default()),
            TransportConfig::default(),
        )
        .unwrap();
        BackendAuthorizer::new(
            pool.system().clone(),
            Uri::from_static("http://rails:8080"),
            Duration::from_secs(1),
        )
    }

    fn parts(method: &str, uri: &str) -> Parts {
        let (parts, _) = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "gateway.example.com")
            .header(header::CONTENT_LENGTH, "12")
            .header(header::AUTHORIZATION, "Bearer user")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn test_authorize_request_shape() {
        let authorizer = authorizer();
        let request = authorizer
            .build_request(&parts("POST", "/group/project/-/jobs/1/proxy?port=80"))
            .unwrap();

        assert_eq!(request.method(), "POST");
        assert_eq!(
            request.uri(),
            "http://rails:8080/group/project/-/jobs/1/proxy/authorize?port=80"
        );
        assert!(request.headers().get(header::HOST).is_none());
        assert!(request.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(request.headers()[header::AUTHORIZATION], "Bearer user");
        assert_eq!(request.headers()[API_REQUEST_HEADER], "true");
    }

    #[tokio::test]
    async fn test_trailing_slash_not_doubled() {
        let authorizer = authorizer();
        let request = authorizer.build_request(&parts("GET", "/gitlab/g/p/")).unwrap();
        assert_eq!(request.uri(), "http://rails:8080/gitlab/g/p/authorize");
    }
}
