//! Correlation ID handling.
//!
//! # Responsibilities
//! - Attach a correlation ID to every request before routing (UUID v4 when absent)
//! - Echo it on the response
//! - Let handlers and logging read it back
//!
//! # Design Decisions
//! - The ID lives in the `X-Request-Id` header, so it reaches the authorizer
//!   and proxy targets with the rest of the inbound headers
//! - A client-supplied ID is kept

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 correlation IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeCorrelationId;

impl MakeRequestId for MakeCorrelationId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

pub fn set_correlation_id_layer() -> SetRequestIdLayer<MakeCorrelationId> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeCorrelationId)
}

pub fn propagate_correlation_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// The request's correlation ID, or `"unknown"` outside the layers.
pub fn correlation_id<B>(request: &Request<B>) -> &str {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .or_else(|| request.headers().get(X_REQUEST_ID).and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
}
