//! Error types shared across subsystems.
//!
//! # Design Decisions
//! - Construction errors are fatal and surface to whoever builds the middleware
//! - Forwarding errors never escape the service; they are rendered as 500/502/504
//! - Classification misses are not errors at all (see `routing::classifier`)

use axum::http::uri::InvalidUri;
use axum::http::StatusCode;
use thiserror::Error;

/// Boxed error used where the concrete source type is not interesting.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to build the redirect middleware from its configuration.
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("invalid redirect URL for '{key}': {source}")]
    InvalidMapping {
        key: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid default redirect URL: {source}")]
    InvalidDefault {
        #[source]
        source: url::ParseError,
    },
}

/// Failure to assemble the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Redirect(#[from] RedirectError),

    #[error("failed to build outbound TLS client: {0}")]
    Tls(#[from] rustls::Error),

    #[error("next.upstream '{0}' is not a socket address")]
    InvalidUpstream(String),
}

/// Failure of the outbound transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream did not answer before the configured timeout")]
    Timeout,

    #[error("upstream request failed: {0}")]
    Failed(#[source] BoxError),
}

impl From<hyper_util::client::legacy::Error> for TransportError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        TransportError::Failed(Box::new(err))
    }
}

/// Failure after the middleware has committed to forwarding.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("destination scheme '{0}' cannot be forwarded")]
    UnsupportedScheme(String),

    #[error("destination has no host")]
    MissingHost,

    #[error("destination '{target}' is not a valid request URI: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: InvalidUri,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ForwardError {
    /// Status code and fixed body reported to the original caller.
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            ForwardError::UnsupportedScheme(_)
            | ForwardError::MissingHost
            | ForwardError::InvalidTarget { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create redirect request")
            }
            ForwardError::Transport(TransportError::Timeout) => {
                (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out")
            }
            ForwardError::Transport(TransportError::Failed(_)) => {
                (StatusCode::BAD_GATEWAY, "Failed to forward request")
            }
        }
    }
}
