//! Shared utilities for integration testing.

use std::net::SocketAddr;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;

use upstream_gateway::{GatewayConfig, GatewayServer, Shutdown};

/// Project path the default jobs-proxy route accepts.
#[allow(dead_code)]
pub const SERVICES_PROXY_PATH: &str = "/group/test/-/jobs/1/proxy";

/// Serve `app` on an ephemeral port.
pub async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a mock application server.
///
/// `*/authorize` answers with `status` and `body` (JSON for 2xx, text
/// otherwise), but only when the gateway marked the call as an API request.
/// Every other path answers `backend:<path>`.
#[allow(dead_code)]
pub async fn start_app_server(status: u16, body: Value) -> SocketAddr {
    let app = Router::new().fallback(move |request: Request<Body>| {
        let body = body.clone();
        async move { app_response(request, status, body) }
    });
    spawn(app).await
}

fn app_response(request: Request<Body>, status: u16, body: Value) -> Response {
    let path = request.uri().path().to_string();
    if !path.ends_with("/authorize") {
        return (StatusCode::OK, format!("backend:{path}")).into_response();
    }
    if request.headers().get("gateway-api-request").is_none() {
        return (StatusCode::BAD_REQUEST, "not an API request").into_response();
    }

    let status = StatusCode::from_u16(status).unwrap();
    if status.is_success() {
        (status, [(header::CONTENT_TYPE, "application/json")], body.to_string()).into_response()
    } else {
        let text = body.as_str().unwrap_or_default().to_string();
        (status, [("x-denied-by", "app")], text).into_response()
    }
}

/// Start the gateway in front of the application server at `backend`.
pub async fn start_gateway(backend: SocketAddr) -> SocketAddr {
    let mut config = GatewayConfig::default();
    config.backend.url = format!("http://{backend}");
    start_gateway_with(config).await
}

pub async fn start_gateway_with(config: GatewayConfig) -> SocketAddr {
    let server = GatewayServer::new(&config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener, Shutdown::new()).await;
    });
    addr
}

/// A port nothing listens on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
