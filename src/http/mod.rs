//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (correlation ID assigned and echoed)
//!     → routing::Upstream (route lookup and dispatch)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{correlation_id, X_REQUEST_ID};
pub use server::{GatewayServer, ServerError};
