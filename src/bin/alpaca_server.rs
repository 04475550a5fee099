//! Alpaca rotator server.
//!
//! Loads the TOML configuration, installs logging, then runs the HTTP API
//! and the discovery responder until Ctrl+C.
//!
//! # Usage
//!
//! ```sh
//! cargo run --bin alpaca_server -- --config config.toml
//! cargo run --bin alpaca_server -- --port 11111
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use alpaca_rotator::services::{run_server, AlpacaContext, DiscoveryResponder};
use alpaca_rotator::{telemetry, Config};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "alpaca_server", version, about = "Alpaca simulated rotator server")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when absent.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the HTTP port from the configuration.
    #[arg(short, long)]
    port: Option<u16>,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.config.exists() {
        Config::load(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        Config::default()
    };
    if let Some(port) = args.port {
        config.network.port = port;
    }
    config.validate().context("validating configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    telemetry::initialise(&config.logging).context("initialising logging")?;
    if !args.config.exists() {
        warn!("{} not found, using defaults", args.config.display());
    }
    info!(
        port = config.network.port,
        discovery_port = config.network.discovery_port,
        "starting Alpaca rotator server"
    );

    let ctx = Arc::new(AlpacaContext::new(config));

    // Discovery runs for the life of the process
    let discovery_addr = ctx.config.network.discovery_addr();
    match DiscoveryResponder::bind(discovery_addr).await {
        Ok(socket) => {
            let responder = DiscoveryResponder::new(ctx.config.network.port);
            tokio::spawn(responder.run(socket));
        }
        Err(e) => error!("discovery disabled, cannot bind {discovery_addr}: {e}"),
    }

    run_server(Arc::clone(&ctx), shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
