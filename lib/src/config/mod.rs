// lib/src/config/mod.rs

pub mod config_constants;
pub mod config_defaults;
pub mod config_structs;

pub use config_constants::*;
pub use config_structs::{
    load_dispatch_config, DispatchConfig, LocationConfig, RestApiConfig, RoutingConfig, SyncConfig,
};
pub use crate::storage_engine::config::{StorageConfig, StorageEngineType};
