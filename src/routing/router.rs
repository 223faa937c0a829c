//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Reject request lines the gateway never serves (`*` target, `CONNECT`)
//! - Clean the path and check it lives under the URL prefix
//! - Scan the route table in order, first match wins
//! - Strip internal headers and hand the request to the matched handler
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan (acceptable for tens of routes); order is configuration
//! - No route → 403, outside the prefix → 404. The git HTTP protocol
//!   requires a 403 when no service matches, so the two stay distinct.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, Uri},
    response::{IntoResponse, Response},
};

use crate::config::{RouteConfig, RouteHandlerKind};
use crate::error::GatewayError;
use crate::http::request::correlation_id;
use crate::observability::metrics;
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, PathPatternMatcher};
use crate::routing::prefix::{clean_uri_path, UrlPrefix};
use crate::security::InternalHeaders;

/// Terminal handler of a route. Owns the response from here on.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, request: Request<Body>) -> Response;
}

/// A compiled route: predicate plus handler.
pub struct RouteEntry {
    name: String,
    matcher: Box<dyn Matcher>,
    handler: Arc<dyn RouteHandler>,
}

impl RouteEntry {
    pub fn new(
        name: impl Into<String>,
        matcher: impl Matcher + 'static,
        handler: Arc<dyn RouteHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            matcher: Box::new(matcher),
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("name", &self.name)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// Handlers a configured route table can refer to.
#[derive(Clone)]
pub struct RouteHandlers {
    pub service_proxy: Arc<dyn RouteHandler>,
    pub backend: Arc<dyn RouteHandler>,
}

impl RouteHandlers {
    fn get(&self, kind: RouteHandlerKind) -> Arc<dyn RouteHandler> {
        match kind {
            RouteHandlerKind::ServiceProxy => self.service_proxy.clone(),
            RouteHandlerKind::Backend => self.backend.clone(),
        }
    }
}

/// Path of a project: one or more namespaces, then the project name.
const PROJECT_PATTERN: &str = r"^/([^/]+/){1,}[^/]+/";

/// The table used when the configuration lists no routes.
pub fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            name: "jobs-proxy".to_string(),
            methods: vec!["GET".to_string(), "POST".to_string()],
            pattern: format!(r"{PROJECT_PATTERN}-/jobs/[0-9]+/proxy\z"),
            handler: RouteHandlerKind::ServiceProxy,
        },
        RouteConfig {
            name: "default".to_string(),
            methods: Vec::new(),
            pattern: "^/".to_string(),
            handler: RouteHandlerKind::Backend,
        },
    ]
}

/// Compile route configs, preserving their order.
pub fn build_route_table(
    routes: &[RouteConfig],
    handlers: &RouteHandlers,
) -> Result<Vec<RouteEntry>, regex::Error> {
    routes
        .iter()
        .map(|route| {
            let methods = route
                .methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok());
            let matcher = AndMatcher::new(vec![
                Box::new(MethodMatcher::new(methods)),
                Box::new(PathPatternMatcher::new(&route.pattern)?),
            ]);
            Ok(RouteEntry::new(route.name.clone(), matcher, handlers.get(route.handler)))
        })
        .collect()
}

/// Entry point for every inbound request.
pub struct Upstream {
    prefix: UrlPrefix,
    routes: Arc<[RouteEntry]>,
    internal_headers: InternalHeaders,
}

impl Upstream {
    pub fn new(prefix: UrlPrefix, routes: Vec<RouteEntry>, internal_headers: InternalHeaders) -> Self {
        Self {
            prefix,
            routes: routes.into(),
            internal_headers,
        }
    }

    pub fn prefix(&self) -> &UrlPrefix {
        &self.prefix
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Find the route for a request, or the rejection to send instead.
    pub fn resolve<B>(&self, request: &Request<B>) -> Result<&RouteEntry, GatewayError> {
        if is_wildcard_target(request.uri()) {
            return Err(GatewayError::WildcardTarget);
        }
        if request.method() == Method::CONNECT {
            return Err(GatewayError::ConnectNotAllowed);
        }

        let path = clean_uri_path(request.uri().path());
        if !self.prefix.matches(&path) {
            return Err(GatewayError::PrefixMismatch(path));
        }

        let stripped = self.prefix.strip(&path);
        self.routes
            .iter()
            .find(|route| route.matcher.matches(request.method(), stripped))
            .ok_or(GatewayError::NoRouteMatched)
    }

    pub async fn dispatch(&self, mut request: Request<Body>) -> Response {
        let start = Instant::now();

        let route = match self.resolve(&request) {
            Ok(route) => route,
            Err(e) => {
                tracing::info!(
                    correlation_id = %correlation_id(&request),
                    method = %request.method(),
                    uri = %request.uri(),
                    error = %e,
                    "Request rejected by router"
                );
                let response = e.into_response();
                metrics::record_request("none", response.status().as_u16(), start);
                return response;
            }
        };

        tracing::debug!(
            correlation_id = %correlation_id(&request),
            route = %route.name,
            "Route matched"
        );

        self.internal_headers.strip(request.headers_mut());
        let response = route.handler.handle(request).await;

        metrics::record_request(&route.name, response.status().as_u16(), start);
        response
    }
}

fn is_wildcard_target(uri: &Uri) -> bool {
    uri.scheme().is_none() && uri.authority().is_none() && uri.path() == "*"
}
