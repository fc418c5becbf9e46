// rest_api/src/main.rs
// Entry point for the dispatch REST API server.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use tokio::sync::oneshot;

use rest_api::config::{bind_address, load_rest_api_config};
use rest_api::{bind_listener, start_server, AppState};

#[derive(Parser, Debug)]
#[command(name = "dispatch-server")]
#[command(version = "0.1.0")]
#[command(about = "Emergency dispatch request store")]
struct ServerArgs {
    /// Path to a dispatch YAML config (defaults to config/dispatch.yaml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
    /// Port to listen on, overriding the config file
    #[arg(long, short = 'p')]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = ServerArgs::parse();

    let config = load_rest_api_config(args.config, args.port)?;
    let addr = bind_address(&config)?;
    let state = AppState::from_config(&config).await?;
    let listener = bind_listener(addr).await?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down."),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    start_server(listener, state, shutdown_rx).await
}
