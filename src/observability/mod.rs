//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (request spans with correlation IDs)
//! ```
//!
//! # Design Decisions
//! - Correlation ID flows through all subsystems and to every outbound call
//! - Metrics are cheap and off unless the exporter is enabled

pub mod logging;
pub mod metrics;
pub mod tracing;
