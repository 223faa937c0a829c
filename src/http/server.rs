//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the transports, handlers and route table from config
//! - Wire up middleware (correlation ID, request spans)
//! - Hand every request to the upstream router
//! - Serve until the shutdown signal fires, then drain

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, Uri},
    response::Response,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::auth::{Authorizer, BackendAuthorizer};
use crate::config::GatewayConfig;
use crate::http::request::{propagate_correlation_id_layer, set_correlation_id_layer};
use crate::lifecycle::Shutdown;
use crate::observability::tracing::make_request_span;
use crate::proxy::transport::{TransportError, TransportPool, TransportTimeouts};
use crate::proxy::{BackendProxyHandler, ServiceProxyHandler, StreamingProxy};
use crate::routing::prefix::UrlPrefix;
use crate::routing::router::{build_route_table, default_routes, RouteHandlers, Upstream};
use crate::security::InternalHeaders;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid backend URL {0:?}")]
    BackendUrl(String),

    #[error("failed to build transport: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid route pattern: {0}")]
    Route(#[from] regex::Error),
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    upstream: Arc<Upstream>,
}

impl GatewayServer {
    /// Create a server that authorizes against the configured backend.
    pub fn new(config: &GatewayConfig) -> Result<Self, ServerError> {
        let (transports, backend) = Self::transports(config)?;
        let authorizer = BackendAuthorizer::new(
            transports.system().clone(),
            backend.clone(),
            Duration::from_secs(config.timeouts.backend_response_header_secs),
        );
        Self::assemble(config, transports, backend, Arc::new(authorizer))
    }

    /// Create a server with a caller-supplied authorizer.
    pub fn with_authorizer(
        config: &GatewayConfig,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self, ServerError> {
        let (transports, backend) = Self::transports(config)?;
        Self::assemble(config, transports, backend, authorizer)
    }

    fn transports(config: &GatewayConfig) -> Result<(Arc<TransportPool>, Uri), ServerError> {
        let backend: Uri = config
            .backend
            .url
            .parse()
            .map_err(|_| ServerError::BackendUrl(config.backend.url.clone()))?;
        if backend.scheme().is_none() || backend.authority().is_none() {
            return Err(ServerError::BackendUrl(config.backend.url.clone()));
        }

        let pool = TransportPool::new(
            TransportTimeouts::from(&config.timeouts),
            config.transport.clone(),
        )?;
        Ok((Arc::new(pool), backend))
    }

    fn assemble(
        config: &GatewayConfig,
        transports: Arc<TransportPool>,
        backend: Uri,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self, ServerError> {
        let handlers = RouteHandlers {
            service_proxy: Arc::new(ServiceProxyHandler::new(
                authorizer,
                StreamingProxy::new(transports.clone()),
            )),
            backend: Arc::new(BackendProxyHandler::new(
                transports.system().clone(),
                backend.clone(),
                Duration::from_secs(config.timeouts.backend_response_header_secs),
            )),
        };

        let routes = if config.routes.is_empty() {
            build_route_table(&default_routes(), &handlers)?
        } else {
            build_route_table(&config.routes, &handlers)?
        };

        let upstream = Arc::new(Upstream::new(
            UrlPrefix::new(backend.path()),
            routes,
            InternalHeaders::new(&config.security.internal_headers),
        ));

        tracing::info!(
            prefix = %upstream.prefix().as_str(),
            routes = upstream.routes().len(),
            "Route table built"
        );

        let router = Self::build_router(upstream.clone());
        Ok(Self { router, upstream })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(upstream: Arc<Upstream>) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(upstream)
            .layer(propagate_correlation_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(set_correlation_id_layer())
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    /// The configured router, for serving on a custom listener or in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn gateway_handler(State(upstream): State<Arc<Upstream>>, request: Request<Body>) -> Response {
    upstream.dispatch(request).await
}
