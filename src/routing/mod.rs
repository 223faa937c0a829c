//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → prefix.rs (clean path, check and strip the URL prefix)
//!     → router.rs (ordered route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → matched handler, or a 400/403/404 rejection
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile matchers (method sets, anchored regexes)
//!     → Freeze as immutable Upstream
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins, in configured order

pub mod matcher;
pub mod prefix;
pub mod router;

pub use prefix::{clean_uri_path, UrlPrefix};
pub use router::{RouteEntry, RouteHandler, Upstream};
