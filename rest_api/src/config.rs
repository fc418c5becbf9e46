// rest_api/src/config.rs

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use lib::config::{load_dispatch_config, DispatchConfig};

/// Loads the dispatch configuration for the server and applies command-line
/// overrides on top of it.
pub fn load_rest_api_config(
    config_file_path: Option<PathBuf>,
    port_override: Option<u16>,
) -> Result<DispatchConfig> {
    let mut config = load_dispatch_config(config_file_path)
        .context("Failed to load dispatch configuration for REST API")?;
    if let Some(port) = port_override {
        info!("Overriding configured port {} with {}", config.rest_api.port, port);
        config.rest_api.port = port;
    }
    Ok(config)
}

pub fn bind_address(config: &DispatchConfig) -> Result<SocketAddr> {
    let address = config.rest_api.bind_address();
    address
        .parse()
        .with_context(|| format!("Invalid REST API bind address: {}", address))
}
