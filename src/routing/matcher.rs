//! Request gate matching.
//!
//! # Responsibilities
//! - Match path prefix (case-sensitive, not segment-aware)
//! - Match request method
//!
//! # Design Decisions
//! - Matchers see only request head (`Parts`), never the body
//! - Path matching is a plain string prefix: `/webhooks` also admits `/webhooksX`
//! - No regex to guarantee O(n) matching

use axum::http::request::Parts;
use axum::http::Method;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request head matches this condition.
    fn matches(&self, parts: &Parts) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, parts: &Parts) -> bool {
        parts.uri.path().starts_with(&self.prefix)
    }
}

/// Matches a single request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, parts: &Parts) -> bool {
        parts.method == self.method
    }
}
