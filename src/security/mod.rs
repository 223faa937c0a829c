//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → router strips internal headers (headers.rs) before dispatch
//!     → proxy handlers replace credentials (headers.rs) before the outbound call
//!     → hop-by-hop headers dropped in both directions (headers.rs)
//! ```
//!
//! # Design Decisions
//! - No trust in client input: internal and credential headers are always rewritten

pub mod headers;

pub use headers::{
    apply_target_headers, remove_hop_by_hop, InternalHeaders, REWRITTEN_FIELDS_HEADER,
};
