//! Outbound HTTP transports for proxied calls.
//!
//! # Responsibilities
//! - Build clients with fixed dial, TLS handshake and response header timeouts
//! - Serve targets without a trust PEM from one shared system-trust client
//! - Serve targets with a trust PEM from a client that trusts exactly that pool
//!
//! # Design Decisions
//! - A published client is never mutated. Each distinct PEM gets its own
//!   client, keyed by the SHA-256 of the PEM text, in a small LRU.
//! - Clients are built outside the cache lock; when two requests race on the
//!   same new PEM the first one published wins.
//! - A PEM that yields no usable certificate falls back to system trust.

use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::Uri;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use lru::LruCache;
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tower::Service;

use crate::config::{TimeoutConfig, TransportConfig};
use crate::observability::metrics;
use crate::proxy::settings::ProxyTargetSettings;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Client used for every outbound call.
pub type ProxyClient = Client<HandshakeTimeout<HttpsConnector<HttpConnector>>, Body>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build TLS configuration: {0}")]
    Tls(#[from] rustls::Error),
}

/// Fixed timeouts applied to every outbound call.
#[derive(Debug, Clone, Copy)]
pub struct TransportTimeouts {
    /// TCP connect.
    pub dial: Duration,
    /// TCP connect plus TLS handshake.
    pub tls_handshake: Duration,
    /// From request start until response headers arrive.
    pub response_header: Duration,
}

impl From<&TimeoutConfig> for TransportTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            dial: Duration::from_secs(config.dial_secs),
            tls_handshake: Duration::from_secs(config.dial_secs + config.tls_handshake_secs),
            response_header: Duration::from_secs(config.response_header_secs),
        }
    }
}

/// Connector wrapper bounding connection establishment (dial + handshake).
#[derive(Debug, Clone)]
pub struct HandshakeTimeout<C> {
    inner: C,
    timeout: Duration,
}

impl<C> HandshakeTimeout<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<C> Service<Uri> for HandshakeTimeout<C>
where
    C: Service<Uri>,
    C::Response: Send + 'static,
    C::Future: Send + 'static,
    C::Error: Into<BoxError>,
{
    type Response = C::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connecting = self.inner.call(uri);
        let timeout = self.timeout;
        Box::pin(async move {
            match tokio::time::timeout(timeout, connecting).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(format!("TLS handshake timeout after {timeout:?}").into()),
            }
        })
    }
}

/// Owner of all outbound clients.
pub struct TransportPool {
    timeouts: TransportTimeouts,
    config: TransportConfig,
    provider: Arc<CryptoProvider>,
    system: ProxyClient,
    pinned: Mutex<LruCache<[u8; 32], ProxyClient>>,
}

impl TransportPool {
    pub fn new(timeouts: TransportTimeouts, config: TransportConfig) -> Result<Self, TransportError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let builder = match HttpsConnectorBuilder::new().with_provider_and_native_roots(provider.clone()) {
            Ok(builder) => builder,
            Err(err) => {
                tracing::warn!(error = %err, "System trust store unavailable, HTTPS targets need a trust PEM");
                let tls = ClientConfig::builder_with_provider(provider.clone())
                    .with_safe_default_protocol_versions()?
                    .with_root_certificates(RootCertStore::empty())
                    .with_no_client_auth();
                HttpsConnectorBuilder::new().with_tls_config(tls)
            }
        };
        let https = builder
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector(&timeouts));
        let system = build_client(https, &timeouts, &config);

        let capacity = NonZeroUsize::new(config.trust_cache_capacity).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            timeouts,
            config,
            provider,
            system,
            pinned: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn timeouts(&self) -> TransportTimeouts {
        self.timeouts
    }

    /// The shared client trusting the system store.
    pub fn system(&self) -> &ProxyClient {
        &self.system
    }

    /// The client matching `target`'s trust configuration.
    pub fn client_for(&self, target: &ProxyTargetSettings) -> Result<ProxyClient, TransportError> {
        if !target.has_trust_pem() {
            return Ok(self.system.clone());
        }

        let key: [u8; 32] = Sha256::digest(target.trust_pem.as_bytes()).into();
        if let Some(client) = self.lock_pinned().get(&key) {
            metrics::record_transport_cache("hit");
            return Ok(client.clone());
        }

        let Some(roots) = parse_trust_pool(&target.trust_pem) else {
            tracing::warn!(url = %target.url, "Trust PEM holds no usable certificate, using system trust");
            metrics::record_transport_cache("empty");
            return Ok(self.system.clone());
        };

        let tls = ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector(&self.timeouts));
        let client = build_client(https, &self.timeouts, &self.config);

        metrics::record_transport_cache("miss");
        let mut pinned = self.lock_pinned();
        Ok(pinned.get_or_insert(key, || client).clone())
    }

    /// Number of distinct trust pools currently cached.
    pub fn cached_trust_pools(&self) -> usize {
        self.lock_pinned().len()
    }

    fn lock_pinned(&self) -> std::sync::MutexGuard<'_, LruCache<[u8; 32], ProxyClient>> {
        // Entries are immutable clients; a poisoned lock still holds a usable cache.
        self.pinned.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn http_connector(timeouts: &TransportTimeouts) -> HttpConnector {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(timeouts.dial));
    http.set_keepalive(Some(Duration::from_secs(10)));
    http
}

fn build_client(
    https: HttpsConnector<HttpConnector>,
    timeouts: &TransportTimeouts,
    config: &TransportConfig,
) -> ProxyClient {
    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_secs))
        .pool_max_idle_per_host(config.max_idle_per_host)
        .build(HandshakeTimeout::new(https, timeouts.tls_handshake))
}

/// Parse every certificate in `pem`. `None` when nothing usable was found.
fn parse_trust_pool(pem: &str) -> Option<RootCertStore> {
    let mut bytes = pem.as_bytes();
    let certs = rustls_pemfile::certs(&mut bytes).filter_map(Result::ok);
    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 {
        tracing::debug!(added, ignored, "Skipped unparsable certificates in trust PEM");
    }
    (added > 0).then_some(roots)
}
