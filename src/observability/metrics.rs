//! Metrics collection and exposition.
//!
//! # Metrics
//! - `payload_router_decisions_total` (counter): by `decision` and `reason`
//! - `payload_router_forwarded_total` (counter): by upstream `status`
//! - `payload_router_forward_duration_seconds` (histogram): upstream round trip

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count a classification outcome.
pub fn record_decision(decision: &'static str, reason: &'static str) {
    counter!("payload_router_decisions_total", "decision" => decision, "reason" => reason)
        .increment(1);
}

/// Count a finished forward. Status 502/504 are recorded for transport failures.
pub fn record_forward(status: u16, start: Instant) {
    counter!("payload_router_forwarded_total", "status" => status.to_string()).increment(1);
    histogram!("payload_router_forward_duration_seconds").record(start.elapsed().as_secs_f64());
}
