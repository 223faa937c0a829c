//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build transports and routes → Start listener
//!
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → trigger → stop accepting → drain in-flight requests → exit
//! ```
//!
//! # Design Decisions
//! - Every shared resource is built explicitly in `main` and injected
//! - No module-level mutable state

pub mod shutdown;

pub use shutdown::Shutdown;
