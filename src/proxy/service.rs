//! Route handler for authorized service proxying.
//!
//! Authorize first, then stream to whatever target the backend granted.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};

use crate::auth::{Authorization, Authorizer};
use crate::error::GatewayError;
use crate::http::request::correlation_id;
use crate::proxy::settings::validate_target;
use crate::proxy::streaming::StreamingProxy;
use crate::routing::router::RouteHandler;

pub struct ServiceProxyHandler {
    authorizer: Arc<dyn Authorizer>,
    proxy: StreamingProxy,
}

impl ServiceProxyHandler {
    pub fn new(authorizer: Arc<dyn Authorizer>, proxy: StreamingProxy) -> Self {
        Self { authorizer, proxy }
    }
}

#[async_trait]
impl RouteHandler for ServiceProxyHandler {
    async fn handle(&self, request: Request<Body>) -> Response {
        let id = correlation_id(&request).to_string();
        let (parts, body) = request.into_parts();

        let granted = match self.authorizer.authorize(&parts).await {
            Ok(Authorization::Granted(granted)) => granted,
            Ok(Authorization::Denied(denied)) => return denied.into_response(),
            Err(e) => {
                return GatewayError::Authorization(e.to_string()).into_response();
            }
        };

        let target = granted.into_target();
        let target = match validate_target(target.as_ref()) {
            Ok(target) => target,
            Err(e) => {
                tracing::error!(correlation_id = %id, error = %e, "Authorization granted an unusable target");
                return GatewayError::from(e).into_response();
            }
        };

        tracing::debug!(
            correlation_id = %id,
            kind = target.kind.as_str(),
            url = %target.url,
            "Proxying to authorized target"
        );
        self.proxy.forward(Request::from_parts(parts, body), target).await
    }
}
