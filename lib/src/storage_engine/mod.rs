// lib/src/storage_engine/mod.rs

pub mod config;
pub mod storage_engine;
pub mod inmemory_storage;
pub mod sled_storage;

pub use storage_engine::RequestStore;
pub use inmemory_storage::InMemoryRequestStore;
pub use sled_storage::SledRequestStore;
pub use config::{StorageConfig, StorageEngineType};

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

/// Creates the request store selected by `config.engine_type`.
///
/// `memory` keeps everything in the process; `sled` persists under
/// `config.data_directory`.
pub fn create_request_store(config: &StorageConfig) -> Result<Arc<dyn RequestStore>> {
    let store: Arc<dyn RequestStore> = match config.engine_type {
        StorageEngineType::Memory => Arc::new(InMemoryRequestStore::new()),
        StorageEngineType::Sled => Arc::new(
            SledRequestStore::open(&config.data_directory)
                .with_context(|| format!("Failed to open sled store in {:?}", config.data_directory))?,
        ),
    };
    info!("Using {} request store", store.get_type());
    Ok(store)
}
