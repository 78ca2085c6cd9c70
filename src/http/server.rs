//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the pass-through handler as fallback
//! - Wrap it in the endpoint redirect middleware
//! - Wire up host middleware (tracing, timeout, request ID)
//! - Bind server to listener and shut down gracefully

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::RouterConfig;
use crate::error::StartupError;
use crate::http::middleware::EndpointRedirectLayer;
use crate::http::passthrough::{next_handler, NextUpstream};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::transport::{HyperTransport, Transport};
use crate::lifecycle::{signals::wait_for_signal, ShutdownSignal};

/// HTTP server for the payload router.
pub struct HttpServer {
    router: Router,
    config: RouterConfig,
}

impl HttpServer {
    /// Create a server forwarding webhooks over a pooled hyper client.
    pub fn new(config: RouterConfig) -> Result<Self, StartupError> {
        let timeout = config.timeouts.upstream_secs.map(Duration::from_secs);
        let transport = HyperTransport::new(timeout)?;
        Self::with_transport(config, transport)
    }

    /// Create a server with a caller-supplied forwarding transport.
    pub fn with_transport<T: Transport>(config: RouterConfig, transport: T) -> Result<Self, StartupError> {
        let redirect = EndpointRedirectLayer::new(config.redirect.clone(), transport)?;

        let upstream = match &config.next.upstream {
            Some(addr) => Some(
                addr.parse::<SocketAddr>()
                    .map_err(|_| StartupError::InvalidUpstream(addr.clone()))?,
            ),
            None => None,
        };
        let next = NextUpstream::new(upstream);

        let router = Self::build_router(&config, redirect, next);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router<T: Transport>(
        config: &RouterConfig,
        redirect: EndpointRedirectLayer<T>,
        next: NextUpstream,
    ) -> Router {
        Router::new()
            .fallback(next_handler)
            .with_state(next)
            .layer(redirect)
            // A forward cut short by the host limit is the upstream's fault
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires or the process is signalled.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            webhook_path = %self.config.redirect.webhook_path,
            mappings = self.config.redirect.redirect_mappings.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.triggered() => {}
                    _ = wait_for_signal() => {}
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
