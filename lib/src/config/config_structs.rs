// lib/src/config/config_structs.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use models::{ActorRole, Coordinates, NewHospital};

use crate::config::config_defaults::*;
use crate::storage_engine::config::StorageConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl RestApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.bind_address())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Root of an OSRM-compatible service; `/route/v1/driving/...` is appended.
    #[serde(default = "default_routing_base_url")]
    pub base_url: String,
    #[serde(default = "default_routing_timeout_ms")]
    pub timeout_ms: u64,
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_submitter_interval_ms")]
    pub submitter_interval_ms: u64,
    /// Shared by ambulance and hospital clients.
    #[serde(default = "default_dispatcher_interval_ms")]
    pub dispatcher_interval_ms: u64,
    #[serde(default = "default_sync_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl SyncConfig {
    pub fn interval_for(&self, role: ActorRole) -> Duration {
        match role {
            ActorRole::User => Duration::from_millis(self.submitter_interval_ms),
            ActorRole::Ambulance | ActorRole::Hospital => {
                Duration::from_millis(self.dispatcher_interval_ms)
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_fallback_coordinates")]
    pub fallback: Coordinates,
    /// How long to wait for a position before using `fallback`.
    #[serde(default = "default_location_timeout_ms")]
    pub timeout_ms: u64,
}

impl LocationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_rest_api_config")]
    pub rest_api: RestApiConfig,
    #[serde(default = "default_storage_config")]
    pub storage: StorageConfig,
    #[serde(default = "default_routing_config")]
    pub routing: RoutingConfig,
    #[serde(default = "default_sync_config")]
    pub sync: SyncConfig,
    #[serde(default = "default_location_config")]
    pub location: LocationConfig,
    /// Seed list for the hospital directory.
    #[serde(default)]
    pub hospitals: Vec<NewHospital>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            rest_api: default_rest_api_config(),
            storage: default_storage_config(),
            routing: default_routing_config(),
            sync: default_sync_config(),
            location: default_location_config(),
            hospitals: Vec::new(),
        }
    }
}

impl DispatchConfig {
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        debug!("Raw YAML content from {:?}:\n{}", path, content);

        let config: DispatchConfig = if content.trim().is_empty() {
            DispatchConfig::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {:?}", path))?
        };
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.submitter_interval_ms == 0 || self.sync.dispatcher_interval_ms == 0 {
            anyhow::bail!("sync intervals must be greater than zero");
        }
        if self.sync.request_timeout_ms == 0 || self.routing.timeout_ms == 0 || self.location.timeout_ms == 0 {
            anyhow::bail!("timeouts must be greater than zero");
        }
        self.location
            .fallback
            .validate()
            .context("location.fallback is not a valid coordinate")?;
        for hospital in &self.hospitals {
            hospital
                .validate()
                .with_context(|| format!("hospital seed {:?} is invalid", hospital.name))?;
        }
        Ok(())
    }
}

/// Loads the dispatch configuration.
///
/// An explicit path must exist. Without one, `config/dispatch.yaml` is read
/// when present and the built-in defaults are used otherwise.
pub fn load_dispatch_config(config_file_path: Option<PathBuf>) -> Result<DispatchConfig> {
    match config_file_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file {:?} does not exist", path);
            }
            DispatchConfig::load_from_yaml(&path)
        }
        None => {
            let path = default_config_path();
            if path.exists() {
                DispatchConfig::load_from_yaml(&path)
            } else {
                warn!("No config file at {:?}, using built-in defaults", path);
                Ok(DispatchConfig::default())
            }
        }
    }
}
