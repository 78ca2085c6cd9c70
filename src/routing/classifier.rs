//! Payload classification.
//!
//! # Responsibilities
//! - Gate requests on path prefix and method
//! - Extract the routing key from the JSON body
//! - Resolve the key to a destination (mapping, then default)
//! - Merge the inbound query string into the destination
//!
//! # Design Decisions
//! - Every miss is a `PassThrough` with a reason, never an error
//! - Destination URLs are parsed once at construction
//! - Single top-level key lookup, no nested paths

use std::collections::HashMap;
use std::fmt;

use axum::http::request::Parts;
use axum::http::Method;
use serde_json::{Map, Number, Value};
use url::{Position, Url};

use crate::config::RedirectConfig;
use crate::error::RedirectError;
use crate::routing::matcher::{Matcher, MethodMatcher, PathPrefixMatcher};

/// Why a request was handed to the next handler untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    PathMismatch,
    MethodNotAllowed,
    BodyUnreadable,
    BodyTooLarge,
    InvalidJson,
    FieldMissing,
    UnsupportedFieldType,
    EmptyField,
    NoDestination,
}

impl PassReason {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            PassReason::PathMismatch => "path_mismatch",
            PassReason::MethodNotAllowed => "method_not_allowed",
            PassReason::BodyUnreadable => "body_unreadable",
            PassReason::BodyTooLarge => "body_too_large",
            PassReason::InvalidJson => "invalid_json",
            PassReason::FieldMissing => "field_missing",
            PassReason::UnsupportedFieldType => "unsupported_field_type",
            PassReason::EmptyField => "empty_field",
            PassReason::NoDestination => "no_destination",
        }
    }
}

/// Outcome of classifying one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptDecision {
    PassThrough(PassReason),
    Forward(Destination),
}

impl InterceptDecision {
    pub fn is_forward(&self) -> bool {
        matches!(self, InterceptDecision::Forward(_))
    }
}

/// A resolved destination with the inbound query merged in.
///
/// The configured URL is kept for scheme and host checks. The request
/// target is assembled from raw strings so the inbound query reaches the
/// destination byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    url: Url,
    target: String,
}

impl Destination {
    pub fn new(url: &Url, inbound_query: Option<&str>) -> Self {
        Self {
            url: url.clone(),
            target: merge_query(url, inbound_query),
        }
    }

    /// Configured destination, before the inbound query is merged.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Outbound request target.
    pub fn as_str(&self) -> &str {
        &self.target
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)
    }
}

/// The routing field as found in the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(&'a Number),
    Other,
}

impl<'a> FieldValue<'a> {
    pub fn from_json(value: &'a Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Text(s),
            Value::Number(n) => FieldValue::Number(n),
            _ => FieldValue::Other,
        }
    }

    /// Normalized routing key, or the reason there is none.
    pub fn routing_key(&self) -> Result<String, PassReason> {
        let raw = match self {
            FieldValue::Text(s) => (*s).to_string(),
            FieldValue::Number(n) => render_number(n),
            FieldValue::Other => return Err(PassReason::UnsupportedFieldType),
        };

        let key = raw.trim();
        if key.is_empty() {
            Err(PassReason::EmptyField)
        } else {
            Ok(key.to_string())
        }
    }
}

/// Render a JSON number as a base-10 integer.
///
/// Fractional parts are truncated toward zero, so `42.9` routes as `"42"`.
fn render_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let truncated = n.as_f64().unwrap_or_default().trunc();
    if truncated == 0.0 {
        // Avoid "-0" for values in (-1, 0)
        "0".to_string()
    } else {
        format!("{truncated}")
    }
}

/// Append the inbound raw query to the destination's query.
///
/// The inbound query is copied as received, never re-encoded. Fragments
/// are dropped since they are never sent on the wire.
pub fn merge_query(destination: &Url, inbound: Option<&str>) -> String {
    let base = &destination[..Position::AfterPath];
    let existing = destination.query().filter(|q| !q.is_empty());
    match (existing, inbound.filter(|q| !q.is_empty())) {
        (Some(existing), Some(inbound)) => format!("{base}?{existing}&{inbound}"),
        (Some(query), None) | (None, Some(query)) => format!("{base}?{query}"),
        (None, None) => base.to_string(),
    }
}

/// Decides whether a request is redirected, and where to.
#[derive(Debug)]
pub struct Classifier {
    path: PathPrefixMatcher,
    method: MethodMatcher,
    field_name: String,
    mappings: HashMap<String, Url>,
    default: Option<Url>,
}

impl Classifier {
    /// Build a classifier, parsing every destination URL.
    ///
    /// Blank config fields are defaulted first.
    pub fn new(config: &RedirectConfig) -> Result<Self, RedirectError> {
        let config = config.clone().with_defaults();

        let mut keys: Vec<&String> = config.redirect_mappings.keys().collect();
        keys.sort();

        let mut mappings = HashMap::with_capacity(keys.len());
        for key in keys {
            let url = Url::parse(&config.redirect_mappings[key]).map_err(|source| {
                RedirectError::InvalidMapping {
                    key: key.clone(),
                    source,
                }
            })?;
            mappings.insert(key.clone(), url);
        }

        let default = if config.default_redirect.is_empty() {
            None
        } else {
            Some(
                Url::parse(&config.default_redirect)
                    .map_err(|source| RedirectError::InvalidDefault { source })?,
            )
        };

        Ok(Self {
            path: PathPrefixMatcher::new(config.webhook_path),
            method: MethodMatcher::new(Method::POST),
            field_name: config.field_name,
            mappings,
            default,
        })
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn webhook_path(&self) -> &str {
        self.path.prefix()
    }

    pub fn mappings(&self) -> &HashMap<String, Url> {
        &self.mappings
    }

    pub fn default_destination(&self) -> Option<&Url> {
        self.default.as_ref()
    }

    /// Path and method gates. Runs before the body is touched.
    pub fn screen(&self, parts: &Parts) -> Result<(), PassReason> {
        if !self.path.matches(parts) {
            return Err(PassReason::PathMismatch);
        }
        if !self.method.matches(parts) {
            return Err(PassReason::MethodNotAllowed);
        }
        Ok(())
    }

    /// Full classification of a request head plus its buffered body.
    pub fn classify(&self, parts: &Parts, body: &[u8]) -> InterceptDecision {
        match self.screen(parts) {
            Ok(()) => self.classify_payload(parts.uri.query(), body),
            Err(reason) => InterceptDecision::PassThrough(reason),
        }
    }

    /// Classify a body that already passed the gates.
    pub fn classify_payload(&self, query: Option<&str>, body: &[u8]) -> InterceptDecision {
        match self.routing_key(body).and_then(|key| self.resolve(&key).ok_or(PassReason::NoDestination)) {
            Ok(destination) => InterceptDecision::Forward(Destination::new(destination, query)),
            Err(reason) => InterceptDecision::PassThrough(reason),
        }
    }

    /// Extract and normalize the routing key from a JSON object body.
    pub fn routing_key(&self, body: &[u8]) -> Result<String, PassReason> {
        let payload: Map<String, Value> =
            serde_json::from_slice(body).map_err(|_| PassReason::InvalidJson)?;
        let value = payload
            .get(&self.field_name)
            .ok_or(PassReason::FieldMissing)?;
        FieldValue::from_json(value).routing_key()
    }

    /// Mapped destination for a key, else the default.
    pub fn resolve(&self, key: &str) -> Option<&Url> {
        self.mappings.get(key).or(self.default.as_ref())
    }
}
