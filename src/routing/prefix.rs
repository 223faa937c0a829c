//! URL prefix (relative URL root) handling and path cleaning.

use percent_encoding::percent_decode_str;

/// Normalize a request path before any matching.
///
/// Percent-escapes are decoded, `.` and `..` segments resolved, repeated
/// separators collapsed. A trailing slash on the input is kept so
/// `/group/project/` still differs from `/group/project`.
pub fn clean_uri_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    if decoded.is_empty() {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut cleaned = String::with_capacity(decoded.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    if cleaned.is_empty() || decoded.ends_with('/') {
        cleaned.push('/');
    }
    cleaned
}

/// The path every routed request must live under. Always ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPrefix(String);

impl UrlPrefix {
    pub fn new(root: &str) -> Self {
        let mut prefix = clean_uri_path(root);
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `path` is the prefix itself (with or without trailing slash) or below it.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.0) || path.len() + 1 == self.0.len() && self.0.starts_with(path)
    }

    /// Remove the prefix, keeping a leading `/`.
    pub fn strip<'a>(&self, path: &'a str) -> &'a str {
        match path.strip_prefix(self.0.as_str()) {
            Some(_) => &path[self.0.len() - 1..],
            None => "/",
        }
    }
}
