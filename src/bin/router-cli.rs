use std::path::PathBuf;

use axum::http::{Method, Request};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use payload_router::config::load_config;
use payload_router::{Classifier, InterceptDecision};

#[derive(Parser)]
#[command(name = "router-cli")]
#[command(about = "Offline checks for payload-router configuration", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "payload-router.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the routing table
    Check,
    /// Show where a payload would be routed
    Route {
        /// File holding the JSON request body
        #[arg(short, long)]
        payload: PathBuf,

        /// Request path, including any query string
        #[arg(long, default_value = "/webhooks")]
        path: String,

        #[arg(long, default_value = "POST")]
        method: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let classifier = Classifier::new(&config.redirect)?;

    let output = match cli.command {
        Commands::Check => routing_table(&classifier),
        Commands::Route { payload, path, method } => {
            let body = std::fs::read(&payload)?;
            let request = Request::builder()
                .method(Method::from_bytes(method.as_bytes())?)
                .uri(path)
                .body(())?;
            let (parts, ()) = request.into_parts();

            match classifier.classify(&parts, &body) {
                InterceptDecision::Forward(destination) => json!({
                    "decision": "forward",
                    "destination": destination.as_str(),
                }),
                InterceptDecision::PassThrough(reason) => json!({
                    "decision": "pass_through",
                    "reason": reason.as_str(),
                }),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn routing_table(classifier: &Classifier) -> Value {
    let mut mappings: Vec<_> = classifier.mappings().iter().collect();
    mappings.sort_by(|a, b| a.0.cmp(b.0));

    json!({
        "field_name": classifier.field_name(),
        "webhook_path": classifier.webhook_path(),
        "mappings": mappings
            .into_iter()
            .map(|(key, url)| json!({ "key": key, "destination": url.as_str() }))
            .collect::<Vec<_>>(),
        "default_redirect": classifier.default_destination().map(|u| u.as_str()),
    })
}
