//! Streaming forwarder for authorized proxy targets.
//!
//! # Responsibilities
//! - Point the inbound request at the target URL, keeping method and body
//! - Swap client credentials for the target's headers
//! - Pick the transport matching the target's trust roots
//! - Stream the response back without buffering
//!
//! # Design Decisions
//! - Exactly one outbound attempt; the body is consumed as it is sent
//! - Response headers from the target are added to, not replacing, what
//!   the gateway already set on the response
//! - Dropping the returned body (client gone) drops the upstream connection

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Version},
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::proxy::body::{send_with_header_timeout, CallError};
use crate::proxy::settings::ProxyTargetSettings;
use crate::proxy::transport::TransportPool;
use crate::security::{apply_target_headers, remove_hop_by_hop};

#[derive(Clone)]
pub struct StreamingProxy {
    transports: Arc<TransportPool>,
}

impl StreamingProxy {
    pub fn new(transports: Arc<TransportPool>) -> Self {
        Self { transports }
    }

    pub fn transports(&self) -> &TransportPool {
        &self.transports
    }

    /// Relay `request` to `target` and stream back whatever it answers.
    pub async fn forward(&self, request: Request<Body>, target: &ProxyTargetSettings) -> Response {
        match self.try_forward(request, target).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %target.url, kind = target.kind.as_str(), error = %e, "Proxy request failed");
                e.into_response()
            }
        }
    }

    async fn try_forward(
        &self,
        mut request: Request<Body>,
        target: &ProxyTargetSettings,
    ) -> Result<Response, GatewayError> {
        target.validate()?;
        *request.uri_mut() = target.resolve_url()?;
        *request.version_mut() = Version::HTTP_11;

        let headers = request.headers_mut();
        remove_hop_by_hop(headers);
        headers.remove(header::HOST);
        apply_target_headers(headers, target);

        let client = self.transports.client_for(target).map_err(|e| {
            metrics::record_upstream_error("tls_config");
            GatewayError::Transport(e.to_string())
        })?;

        let timeout = self.transports.timeouts().response_header;
        let upstream: hyper::Response<Incoming> =
            match send_with_header_timeout(&client, request, timeout).await {
                Ok(response) => response,
                Err(e @ CallError::HeaderTimeout(_)) => {
                    metrics::record_upstream_error("timeout");
                    return Err(GatewayError::Transport(e.to_string()));
                }
                Err(e) => {
                    metrics::record_upstream_error("transport");
                    return Err(GatewayError::Transport(format!("failed to proxy request: {e}")));
                }
            };

        tracing::debug!(url = %target.url, status = %upstream.status(), "Proxy response received");

        let (mut parts, body) = upstream.into_parts();
        remove_hop_by_hop(&mut parts.headers);

        let mut response = Response::new(Body::new(body));
        *response.status_mut() = parts.status;
        let headers = response.headers_mut();
        for (name, value) in parts.headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TimeoutConfig, TransportConfig};
    use crate::proxy::transport::TransportTimeouts;
    use axum::body::Bytes;
    use axum::http::{Method, StatusCode};
    use axum::routing::any;
    use axum::Router;
    use hyper::body::Frame;
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    fn proxy() -> StreamingProxy {
        proxy_with(TimeoutConfig::default())
    }

    fn proxy_with(timeouts: TimeoutConfig) -> StreamingProxy {
        let pool =
            TransportPool::new(TransportTimeouts::from(&timeouts), TransportConfig::default())
                .unwrap();
        StreamingProxy::new(Arc::new(pool))
    }

    fn one_second_headers() -> TimeoutConfig {
        TimeoutConfig {
            response_header_secs: 1,
            ..TimeoutConfig::default()
        }
    }

    /// Body that yields each chunk after `delay`.
    fn trickle(chunks: &'static [&'static str], delay: Duration) -> Body {
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Frame<Bytes>, Infallible>>(1);
        tokio::spawn(async move {
            for &chunk in chunks {
                tokio::time::sleep(delay).await;
                if tx.send(Ok(Frame::data(Bytes::from_static(chunk.as_bytes())))).await.is_err() {
                    return;
                }
            }
        });
        Body::new(StreamBody(rx))
    }

    struct StreamBody(tokio::sync::mpsc::Receiver<Result<Frame<Bytes>, Infallible>>);

    impl hyper::body::Body for StreamBody {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            self.0.poll_recv(cx)
        }
    }

    async fn spawn_target(app: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    async fn status_and_body(response: Response) -> (StatusCode, String) {
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_websocket_target_rejected() {
        let target = ProxyTargetSettings::new("ws://localhost:1234");
        let response = proxy().forward(Request::new(Body::empty()), &target).await;
        let (status, body) = status_and_body(response).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, crate::error::INTERNAL_ERROR_BODY);
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let target = ProxyTargetSettings::new("");
        let response = proxy().forward(Request::new(Body::empty()), &target).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_unavailable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = ProxyTargetSettings::new(format!("http://{addr}/"));
        let response = proxy().forward(Request::new(Body::empty()), &target).await;
        let (status, body) = status_and_body(response).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.starts_with("failed to proxy request"));
    }

    #[tokio::test]
    async fn test_slow_upload_not_counted_as_header_wait() {
        let addr = spawn_target(Router::new().route("/", any(|body: Bytes| async move { body }))).await;
        let target = ProxyTargetSettings::new(format!("http://{addr}/"));

        // Four chunks over about two seconds against a one second header budget.
        let request = Request::builder()
            .method(Method::POST)
            .body(trickle(&["chunk", "chunk", "chunk", "chunk"], Duration::from_millis(500)))
            .unwrap();
        let response = proxy_with(one_second_headers()).forward(request, &target).await;
        let (status, body) = status_and_body(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "chunkchunkchunkchunk");
    }

    #[tokio::test]
    async fn test_slow_headers_after_upload_time_out() {
        let app = Router::new().route(
            "/",
            any(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        );
        let addr = spawn_target(app).await;
        let target = ProxyTargetSettings::new(format!("http://{addr}/"));

        let response = proxy_with(one_second_headers())
            .forward(Request::new(Body::empty()), &target)
            .await;
        let (status, body) = status_and_body(response).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.starts_with("timed out waiting for response headers"), "{body}");
    }
}
