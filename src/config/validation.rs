//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Destination URLs must parse
//! - Listener and upstream addresses must parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RouterConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("redirect_mappings['{key}']: invalid URL '{url}': {reason}")]
    InvalidMappingUrl { key: String, url: String, reason: String },

    #[error("default_redirect: invalid URL '{url}': {reason}")]
    InvalidDefaultUrl { url: String, reason: String },

    #[error("listener.bind_address: '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("next.upstream: '{0}' is not a socket address")]
    InvalidUpstream(String),

    #[error("redirect.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Sorted so error output is stable across runs
    let mut keys: Vec<&String> = config.redirect.redirect_mappings.keys().collect();
    keys.sort();
    for key in keys {
        let url = &config.redirect.redirect_mappings[key];
        if let Err(e) = Url::parse(url) {
            errors.push(ValidationError::InvalidMappingUrl {
                key: key.clone(),
                url: url.clone(),
                reason: e.to_string(),
            });
        }
    }

    let default = &config.redirect.default_redirect;
    if !default.is_empty() {
        if let Err(e) = Url::parse(default) {
            errors.push(ValidationError::InvalidDefaultUrl {
                url: default.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(upstream) = &config.next.upstream {
        if upstream.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidUpstream(upstream.clone()));
        }
    }

    if config.redirect.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
