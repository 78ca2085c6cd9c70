//! Payload router library.
//!
//! Routes webhook POSTs to per-endpoint destinations based on a field in
//! their JSON body, and hands every other request to the next handler.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::RouterConfig;
pub use http::{EndpointRedirect, EndpointRedirectLayer, HttpServer};
pub use lifecycle::Shutdown;
pub use routing::{Classifier, Destination, InterceptDecision, PassReason};
