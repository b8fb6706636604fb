//! claimrace - Entry Point
//!
//! `serve` (default): observer server streaming races over WebSocket
//! `race`: one race against the sandbox ledger, events as JSON lines on stdout
//! `inspect`: spendable balance and claimable resources of a live account

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use claimrace_bot::{AppConfig, Application};
use claimrace_core::Address;
use claimrace_engine::JsonLinesSink;

/// Time-triggered competitive claim orchestrator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via CLAIMRACE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the observer server
    Serve,
    /// Run a single race against the sandbox ledger (set RUST_LOG=warn for clean output)
    Race {
        /// Recovery phrase of the claimant wallet
        #[arg(long)]
        seed_phrase: String,
        /// Recovery phrase of the fee sponsor
        #[arg(long)]
        sponsor_phrase: Option<String>,
        /// Address that receives the relayed balance
        #[arg(long)]
        destination: String,
        /// Claimable resource id
        #[arg(long)]
        resource: String,
    },
    /// Show spendable balance and claimable resources of an address
    Inspect {
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    claimrace_telemetry::init_logging()?;

    info!("Starting claimrace v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > CLAIMRACE_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("CLAIMRACE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::load(&config_path)?;
    info!(network = %config.ledger.network, port = config.server.port, "Configuration loaded");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let app = Application::new(config)?;
            spawn_shutdown_listener(app.shutdown_token());
            app.run().await?;
        }
        Command::Race {
            seed_phrase,
            sponsor_phrase,
            destination,
            resource,
        } => {
            let app = Application::new(config)?;
            spawn_shutdown_listener(app.shutdown_token());

            let request = serde_json::json!({
                "seed_phrase": seed_phrase,
                "sponsor_phrase": sponsor_phrase,
                "withdrawal_address": destination,
                "locked_balance_id": resource,
            })
            .to_string();
            let sink = Arc::new(JsonLinesSink::new(tokio::io::stdout()));

            let report = app.race(&request, sink).await?;
            info!(
                winner = ?report.winner(),
                attempts = report.total_attempts(),
                relay = ?report.relay,
                "Race finished"
            );
        }
        Command::Inspect { address } => {
            let address = Address::parse(&address)?;
            let (balance, resources) =
                claimrace_bot::app::inspect_account(&config.ledger, address.clone()).await?;

            println!("{address}: spendable {balance}");
            for resource in resources {
                println!("  {} {} {}", resource.id, resource.amount, resource.asset);
            }
        }
    }

    Ok(())
}

/// Cancel `token` on ctrl-c.
fn spawn_shutdown_listener(token: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });
}
