//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Middleware and server produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (decision counters, forward latency)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line the middleware emits
//! - Metric updates are cheap no-ops until an exporter is installed
//! - Pass-through is logged at debug; forwards at info

pub mod logging;
pub mod metrics;
