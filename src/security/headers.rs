//! Header sanitizing for inbound and outbound requests.
//!
//! # Responsibilities
//! - Strip gateway-internal headers a client could forge
//! - Inject a proxy target's credential headers into the outbound request
//! - Strip hop-by-hop headers from anything relayed across a connection
//!
//! # Design Decisions
//! - Never trust a client-supplied `Authorization` on a proxied call
//! - Target headers replace, never merge with, inbound values of the same name

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::proxy::settings::ProxyTargetSettings;

/// Carries the list of multipart fields rewritten by the upload handler.
pub const REWRITTEN_FIELDS_HEADER: &str = "Gateway-Multipart-Fields";

/// Connection-scoped headers that must not be relayed to the next hop.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn remove_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Precompiled blacklist of internal-use-only request headers.
#[derive(Debug, Clone, Default)]
pub struct InternalHeaders {
    names: Vec<HeaderName>,
}

impl InternalHeaders {
    /// Invalid names are skipped; config validation reports them.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names
                .iter()
                .filter_map(|n| HeaderName::from_bytes(n.as_ref().as_bytes()).ok())
                .collect(),
        }
    }

    pub fn strip(&self, headers: &mut HeaderMap) {
        for name in &self.names {
            headers.remove(name);
        }
    }
}

/// Replace outbound credentials with the ones granted for `target`.
pub fn apply_target_headers(headers: &mut HeaderMap, target: &ProxyTargetSettings) {
    headers.remove(header::AUTHORIZATION);

    // Names are matched case-insensitively, so clear every one before
    // appending or a later spelling would drop an earlier one's values.
    let mut granted = Vec::with_capacity(target.headers.len());
    for (name, values) in &target.headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::warn!(header = %name, "Skipping invalid target header name");
            continue;
        };
        headers.remove(&name);
        granted.push((name, values));
    }

    for (name, values) in granted {
        for value in values {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.append(&name, value);
                }
                Err(_) => tracing::warn!(header = %name, "Skipping invalid target header value"),
            }
        }
    }
}
