//! Router behaviour seen from the outside: prefix, rejections, correlation IDs.

mod common;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::{start_app_server, start_gateway, start_gateway_with};
use upstream_gateway::config::{RouteConfig, RouteHandlerKind};
use upstream_gateway::GatewayConfig;

#[tokio::test]
async fn test_default_route_reaches_backend() {
    let app = start_app_server(200, json!({})).await;
    let gateway = start_gateway(app).await;

    let resp = reqwest::get(format!("http://{gateway}/group/test/-/issues?page=2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "backend:/group/test/-/issues");
}

#[tokio::test]
async fn test_path_outside_prefix_is_not_found() {
    let app = start_app_server(200, json!({})).await;
    let mut config = GatewayConfig::default();
    config.backend.url = format!("http://{app}/gitlab");
    let gateway = start_gateway_with(config).await;

    let resp = reqwest::get(format!("http://{gateway}/other/page")).await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = reqwest::get(format!("http://{gateway}/gitlab/page")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "backend:/gitlab/page");
}

#[tokio::test]
async fn test_no_matching_route_is_forbidden() {
    let app = start_app_server(200, json!({})).await;
    let mut config = GatewayConfig::default();
    config.backend.url = format!("http://{app}");
    config.routes = vec![RouteConfig {
        name: "api".into(),
        methods: vec!["GET".into()],
        pattern: "^/api/".into(),
        handler: RouteHandlerKind::Backend,
    }];
    let gateway = start_gateway_with(config).await;

    let resp = reqwest::get(format!("http://{gateway}/elsewhere")).await.unwrap();
    assert_eq!(resp.status(), 403);
    assert_eq!(resp.text().await.unwrap(), "Forbidden");

    let resp = reqwest::get(format!("http://{gateway}/api/v4/projects")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_dot_segments_cannot_escape_prefix() {
    let app = start_app_server(200, json!({})).await;
    let mut config = GatewayConfig::default();
    config.backend.url = format!("http://{app}/gitlab");
    let gateway = start_gateway_with(config).await;

    // Raw request so the client does not normalise the path first.
    let mut stream = TcpStream::connect(gateway).await.unwrap();
    stream
        .write_all(b"GET /gitlab/../secret HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 404"), "{raw}");
}

#[tokio::test]
async fn test_asterisk_target_is_bad_request() {
    let app = start_app_server(200, json!({})).await;
    let gateway = start_gateway(app).await;

    let mut stream = TcpStream::connect(gateway).await.unwrap();
    stream
        .write_all(b"OPTIONS * HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 400"), "{raw}");
}

#[tokio::test]
async fn test_correlation_id_generated_and_echoed() {
    let app = start_app_server(200, json!({})).await;
    let gateway = start_gateway(app).await;

    let resp = reqwest::get(format!("http://{gateway}/")).await.unwrap();
    let generated = resp.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let resp = reqwest::Client::new()
        .get(format!("http://{gateway}/"))
        .header("x-request-id", "client-chosen")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "client-chosen");
}
