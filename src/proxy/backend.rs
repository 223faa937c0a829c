//! Catch-all forwarding to the application server.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Uri},
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::http::request::correlation_id;
use crate::observability::metrics;
use crate::proxy::body::{send_with_header_timeout, CallError};
use crate::proxy::transport::ProxyClient;
use crate::routing::router::RouteHandler;
use crate::security::remove_hop_by_hop;

/// Forwards requests unchanged to the backend, keeping path and query.
pub struct BackendProxyHandler {
    client: ProxyClient,
    backend: Uri,
    timeout: Duration,
}

impl BackendProxyHandler {
    pub fn new(client: ProxyClient, backend: Uri, timeout: Duration) -> Self {
        Self {
            client,
            backend,
            timeout,
        }
    }

    /// Rewrite scheme and authority to the backend's.
    fn backend_uri(&self, uri: &Uri) -> Result<Uri, GatewayError> {
        let mut parts = uri.clone().into_parts();
        parts.scheme = self.backend.scheme().cloned();
        parts.authority = self.backend.authority().cloned();
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some("/".parse().map_err(|_| GatewayError::MalformedUrl)?);
        }
        Uri::from_parts(parts).map_err(|e| GatewayError::Upstream(e.to_string()))
    }

    async fn try_handle(&self, mut request: Request<Body>) -> Result<Response, GatewayError> {
        *request.uri_mut() = self.backend_uri(request.uri())?;
        remove_hop_by_hop(request.headers_mut());
        request.headers_mut().remove(header::HOST);

        let response = match send_with_header_timeout(&self.client, request, self.timeout).await {
            Ok(response) => response,
            Err(e @ CallError::HeaderTimeout(_)) => {
                metrics::record_upstream_error("backend_timeout");
                return Err(GatewayError::Upstream(e.to_string()));
            }
            Err(e) => {
                metrics::record_upstream_error("backend");
                return Err(GatewayError::Upstream(e.to_string()));
            }
        };

        let (mut parts, body) = response.into_parts();
        remove_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

#[async_trait]
impl RouteHandler for BackendProxyHandler {
    async fn handle(&self, request: Request<Body>) -> Response {
        let id = correlation_id(&request).to_string();
        match self.try_handle(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(correlation_id = %id, error = %e, "Backend request failed");
                e.into_response()
            }
        }
    }
}
