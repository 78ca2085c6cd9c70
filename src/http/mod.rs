//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace/request-id/timeout layers)
//!     → middleware/endpoint_redirect.rs
//!         → body.rs (buffer body once)
//!         → routing::Classifier (decide)
//!         ├─ PassThrough → passthrough.rs (next handler, body restored)
//!         └─ Forward     → forwarder.rs → transport.rs → destination
//!     → Send to client
//! ```

pub mod body;
pub mod forwarder;
pub mod middleware;
pub mod passthrough;
pub mod request;
pub mod server;
pub mod transport;

pub use forwarder::Forwarder;
pub use middleware::{EndpointRedirect, EndpointRedirectLayer};
pub use passthrough::NextUpstream;
pub use server::HttpServer;
pub use transport::{HyperTransport, Transport};
