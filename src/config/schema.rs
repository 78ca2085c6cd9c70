//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// JSON field inspected when none is configured.
pub const DEFAULT_FIELD_NAME: &str = "endpoint_id";

/// Path prefix that activates the router when none is configured.
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhooks";

/// Redirect status accepted for compatibility; forwarding never emits it.
pub const DEFAULT_STATUS_CODE: u16 = 302;

/// Root configuration for the payload router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Body-based redirect rules.
    pub redirect: RedirectConfig,

    /// Downstream service receiving pass-through traffic.
    pub next: NextConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Routing rules for webhook payloads.
///
/// Field names follow the TOML snake_case convention; the camelCase names
/// used by existing deployments are accepted as aliases.
///
/// Destination URLs must be absolute. Relative or scheme-less values such
/// as `/hook` or `api.example.com/hook` fail validation at startup. URLs
/// with a non-HTTP scheme (`mailto:`, `ftp://`) load, but a request routed
/// to one is answered with 500 and never sent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// JSON key extracted from the request body.
    #[serde(alias = "fieldName")]
    pub field_name: String,

    /// Routing key -> destination URL.
    #[serde(alias = "redirectMappings")]
    pub redirect_mappings: HashMap<String, String>,

    /// Destination used when no mapping matches. Empty disables the fallback.
    #[serde(alias = "defaultRedirect")]
    pub default_redirect: String,

    /// Only paths starting with this prefix are inspected.
    #[serde(alias = "webhookPath")]
    pub webhook_path: String,

    /// Reserved for redirect responses; requests are always forwarded.
    #[serde(alias = "statusCode")]
    pub status_code: u16,

    /// Largest body buffered for inspection.
    #[serde(alias = "maxBodyBytes")]
    pub max_body_bytes: usize,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            field_name: DEFAULT_FIELD_NAME.to_string(),
            redirect_mappings: HashMap::new(),
            default_redirect: String::new(),
            webhook_path: DEFAULT_WEBHOOK_PATH.to_string(),
            status_code: DEFAULT_STATUS_CODE,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

impl RedirectConfig {
    /// Fill blank fields with their defaults.
    ///
    /// Serde defaults only cover missing keys; this also covers keys that
    /// were present but empty, and configs built in code.
    pub fn with_defaults(mut self) -> Self {
        if self.field_name.is_empty() {
            self.field_name = DEFAULT_FIELD_NAME.to_string();
        }
        if self.webhook_path.is_empty() {
            self.webhook_path = DEFAULT_WEBHOOK_PATH.to_string();
        }
        if self.status_code == 0 {
            self.status_code = DEFAULT_STATUS_CODE;
        }
        self
    }
}

/// Pass-through target used by the standalone server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NextConfig {
    /// Upstream address (e.g., "127.0.0.1:3000"). None answers 404.
    pub upstream: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout for forwarded webhook calls in seconds. Unset means none.
    pub upstream_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
