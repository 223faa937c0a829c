//! Proxy target settings handed out by the authorizer.
//!
//! A `ProxyTargetSettings` value is decoded fresh for every request from the
//! authorization response, read-only for the rest of the request and then
//! dropped. An absent target (`None`) means authorization granted nothing to
//! proxy to, which is never valid.
//!
//! The wire names (`Url`, `Header`, `CAPem`) follow the JSON emitted by the
//! authorization backend.

use std::collections::BTreeMap;

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for a proxy target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("service details not specified")]
    MissingSettings,

    #[error("invalid URL")]
    MalformedUrl,

    #[error("invalid scheme: {0:?}")]
    UnsupportedScheme(String),
}

/// Which authorization field a target was decoded from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetKind {
    /// Generic service proxy (`Service`).
    #[default]
    Service,
    /// CI build service proxy (`BuildService`).
    BuildService,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Service => "service",
            TargetKind::BuildService => "build_service",
        }
    }
}

/// A single proxy target: where to send the request, which headers to
/// inject, and which CAs to trust.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyTargetSettings {
    /// The URL to connect to.
    #[serde(rename = "Url", default)]
    pub url: String,

    /// Headers (notably `Authorization`) to send with the request.
    #[serde(rename = "Header", default)]
    pub headers: BTreeMap<String, Vec<String>>,

    /// PEM-encoded CA roots to validate the target with. Empty means the
    /// system trust store.
    #[serde(rename = "CAPem", default)]
    pub trust_pem: String,

    #[serde(skip)]
    pub kind: TargetKind,
}

impl ProxyTargetSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Check that the URL parses and uses `http` or `https`.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let scheme = parse_scheme(&self.url)?;
        if scheme != "http" && scheme != "https" {
            return Err(SettingsError::UnsupportedScheme(scheme));
        }
        Ok(())
    }

    /// Parse `url` into the absolute URI the outbound call is sent to.
    pub fn resolve_url(&self) -> Result<Uri, SettingsError> {
        parse_scheme(&self.url)?;
        let uri: Uri = self.url.parse().map_err(|_| SettingsError::MalformedUrl)?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(SettingsError::MalformedUrl);
        }
        Ok(uri)
    }

    /// Values for `name`, matched case-insensitively.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .flat_map(|(_, values)| values.iter())
    }

    pub fn has_trust_pem(&self) -> bool {
        !self.trust_pem.is_empty()
    }
}

/// Equality over URL, trust PEM and the full header mapping. Value order
/// within a header is significant; the kind tag is not compared.
impl PartialEq for ProxyTargetSettings {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.trust_pem == other.trust_pem && self.headers == other.headers
    }
}

impl Eq for ProxyTargetSettings {}

/// Validate a possibly absent target.
pub fn validate_target(
    target: Option<&ProxyTargetSettings>,
) -> Result<&ProxyTargetSettings, SettingsError> {
    let target = target.ok_or(SettingsError::MissingSettings)?;
    target.validate()?;
    Ok(target)
}

/// Structural equality where two absent targets are equal.
pub fn targets_equal(a: Option<&ProxyTargetSettings>, b: Option<&ProxyTargetSettings>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Extract the lowercased RFC 3986 scheme of `raw`.
///
/// Lenient on purpose: `http:` has a scheme and no host and still passes.
/// Control characters, a leading `:` and broken percent escapes are
/// malformed. A string without a scheme yields an empty one.
fn parse_scheme(raw: &str) -> Result<String, SettingsError> {
    if raw.bytes().any(|b| b < 0x20 || b == 0x7f) {
        return Err(SettingsError::MalformedUrl);
    }
    check_escapes(raw)?;

    for (i, c) in raw.char_indices() {
        match c {
            'a'..='z' | 'A'..='Z' => {}
            '0'..='9' | '+' | '-' | '.' if i > 0 => {}
            ':' if i == 0 => return Err(SettingsError::MalformedUrl),
            ':' => return Ok(raw[..i].to_ascii_lowercase()),
            _ => return Ok(String::new()),
        }
    }
    Ok(String::new())
}

fn check_escapes(raw: &str) -> Result<(), SettingsError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(SettingsError::MalformedUrl);
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
