//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method (exact, any of a set)
//! - Match the prefix-stripped, cleaned path (prefix or regex)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Matchers see the method and the cleaned path only, never raw input
//! - Path matching is case-sensitive
//! - Empty method set = any method

use axum::http::Method;
use regex::Regex;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if `method` and the stripped `path` satisfy this condition.
    fn matches(&self, method: &Method, path: &str) -> bool;
}

/// Matches one of a set of methods.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, method: &Method, _path: &str) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Matches the path against a regular expression.
#[derive(Debug, Clone)]
pub struct PathPatternMatcher {
    pattern: Regex,
}

impl PathPatternMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Matcher for PathPatternMatcher {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.matchers.iter().all(|m| m.matches(method, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_matcher() {
        let matcher = MethodMatcher::new([Method::GET, Method::POST]);
        assert!(matcher.matches(&Method::GET, "/"));
        assert!(matcher.matches(&Method::POST, "/"));
        assert!(!matcher.matches(&Method::DELETE, "/"));

        let any = MethodMatcher::new([]);
        assert!(any.matches(&Method::PATCH, "/"));
    }

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");
        assert!(matcher.matches(&Method::GET, "/api/v4"));
        assert!(!matcher.matches(&Method::GET, "/images"));
    }

    #[test]
    fn test_pattern_matcher() {
        let matcher = PathPatternMatcher::new(r"^/([^/]+/){1,}[^/]+/-/jobs/[0-9]+/proxy\z").unwrap();
        assert!(matcher.matches(&Method::GET, "/group/project/-/jobs/1/proxy"));
        assert!(matcher.matches(&Method::GET, "/group/sub/project/-/jobs/42/proxy"));
        assert!(!matcher.matches(&Method::GET, "/project/-/jobs/1/proxy"));
        assert!(!matcher.matches(&Method::GET, "/group/project/-/jobs/abc/proxy"));
        assert!(!matcher.matches(&Method::GET, "/group/project/-/jobs/1/proxy/extra"));
        assert!(PathPatternMatcher::new("(").is_err());
    }

    #[test]
    fn test_and_matcher() {
        let matcher = AndMatcher::new(vec![
            Box::new(MethodMatcher::new([Method::POST])),
            Box::new(PathPrefixMatcher::new("/upload")),
        ]);
        assert!(matcher.matches(&Method::POST, "/upload/file"));
        assert!(!matcher.matches(&Method::GET, "/upload/file"));
        assert!(!matcher.matches(&Method::POST, "/download"));
    }
}
