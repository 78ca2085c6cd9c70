//! Payload router server.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                PAYLOAD ROUTER                │
//!                         │                                              │
//!   Webhook POST          │  ┌─────────┐   ┌────────────┐   ┌─────────┐  │     Mapped
//!   ──────────────────────┼─▶│  http   │──▶│ classifier │──▶│forwarder│──┼───▶ destination
//!                         │  │ server  │   │ (JSON key) │   └─────────┘  │
//!                         │  └─────────┘   └─────┬──────┘                │
//!                         │                      │ pass-through          │
//!                         │                      ▼                       │
//!                         │               ┌────────────┐                 │     Next
//!                         │               │    next    │─────────────────┼───▶ upstream
//!                         │               │  upstream  │                 │
//!                         │               └────────────┘                 │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use payload_router::config::{load_config, validate_config, RouterConfig};
use payload_router::observability::{logging, metrics};
use payload_router::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "payload-router")]
#[command(about = "Routes webhooks to per-endpoint destinations by JSON payload field", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => RouterConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        if let Err(errors) = validate_config(&config) {
            for e in errors {
                eprintln!("{}", e);
            }
            return ExitCode::FAILURE;
        }
    }

    logging::init_tracing(&config.observability);

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Router failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("payload-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        field_name = %config.redirect.field_name,
        webhook_path = %config.redirect.webhook_path,
        mappings = config.redirect.redirect_mappings.len(),
        has_default = !config.redirect.default_redirect.is_empty(),
        next_upstream = ?config.next.upstream,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // Build before binding so a bad destination never accepts traffic
    let server = HttpServer::new(config.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
