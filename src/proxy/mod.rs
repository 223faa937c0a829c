//! Outbound proxying subsystem.
//!
//! # Data Flow
//! ```text
//! Matched request
//!     → service.rs (authorize, decode the granted target)
//!     → settings.rs (validate and resolve the target URL)
//!     → transport.rs (client for the target's trust roots)
//!     → streaming.rs (forward, stream the response back)
//!
//! Everything else
//!     → backend.rs (forward to the application server)
//! ```
//!
//! # Design Decisions
//! - Settings are plain values decoded per request and never mutated
//! - Transports are shared and immutable once published to the cache

pub mod backend;
pub mod body;
pub mod service;
pub mod settings;
pub mod streaming;
pub mod transport;

pub use backend::BackendProxyHandler;
pub use service::ServiceProxyHandler;
pub use settings::{ProxyTargetSettings, SettingsError, TargetKind};
pub use streaming::StreamingProxy;
pub use transport::{ProxyClient, TransportPool, TransportTimeouts};
