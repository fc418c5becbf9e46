// lib/src/config/config_defaults.rs
use std::path::PathBuf;

use models::Coordinates;

use crate::config::config_constants::*;
use crate::storage_engine::config::{StorageConfig, StorageEngineType};
use crate::config::config_structs::{LocationConfig, RestApiConfig, RoutingConfig, SyncConfig};

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
pub fn default_data_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIRECTORY)
}
pub fn default_storage_engine_type() -> StorageEngineType { StorageEngineType::Memory }
pub fn default_host() -> String { DEFAULT_REST_API_HOST.to_string() }
pub fn default_port() -> u16 { DEFAULT_REST_API_PORT }
pub fn default_routing_base_url() -> String { DEFAULT_OSRM_BASE_URL.to_string() }
pub fn default_routing_timeout_ms() -> u64 { DEFAULT_ROUTING_TIMEOUT_MS }
pub fn default_submitter_interval_ms() -> u64 { DEFAULT_SUBMITTER_INTERVAL_MS }
pub fn default_dispatcher_interval_ms() -> u64 { DEFAULT_DISPATCHER_INTERVAL_MS }
pub fn default_sync_request_timeout_ms() -> u64 { DEFAULT_SYNC_REQUEST_TIMEOUT_MS }
pub fn default_location_timeout_ms() -> u64 { DEFAULT_LOCATION_TIMEOUT_MS }

pub fn default_fallback_coordinates() -> Coordinates {
    Coordinates {
        latitude: DEFAULT_FALLBACK_LATITUDE,
        longitude: DEFAULT_FALLBACK_LONGITUDE,
    }
}

pub fn default_rest_api_config() -> RestApiConfig {
    RestApiConfig { host: default_host(), port: default_port() }
}
pub fn default_storage_config() -> StorageConfig {
    StorageConfig::default()
}
pub fn default_routing_config() -> RoutingConfig {
    RoutingConfig {
        base_url: default_routing_base_url(),
        timeout_ms: default_routing_timeout_ms(),
    }
}
pub fn default_sync_config() -> SyncConfig {
    SyncConfig {
        submitter_interval_ms: default_submitter_interval_ms(),
        dispatcher_interval_ms: default_dispatcher_interval_ms(),
        request_timeout_ms: default_sync_request_timeout_ms(),
    }
}
pub fn default_location_config() -> LocationConfig {
    LocationConfig {
        fallback: default_fallback_coordinates(),
        timeout_ms: default_location_timeout_ms(),
    }
}
