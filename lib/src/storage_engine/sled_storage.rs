// lib/src/storage_engine/sled_storage.rs
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};

use models::{
    DispatchError, DispatchResult, EmergencyRequest, NewEmergencyRequest, TransitionPatch,
};

use super::storage_engine::RequestStore;
use crate::dispatch::apply_patch;

const REQUESTS_TREE: &str = "emergency_requests";
// A compare-and-swap only loses when another writer committed in between,
// so a handful of rounds is plenty.
const MAX_CAS_ATTEMPTS: usize = 64;

fn storage_error(context: &str, err: sled::Error) -> DispatchError {
    error!("{}: {}", context, err);
    DispatchError::StorageError(format!("{}: {}", context, err))
}

fn request_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Persistent request store on sled. Keys are big-endian ids, so iteration
/// order is insertion order. Transitions commit through compare-and-swap:
/// a writer that loses the race re-reads the record and re-runs the guards.
#[derive(Debug, Clone)]
pub struct SledRequestStore {
    db: sled::Db,
    requests: sled::Tree,
    path: Option<PathBuf>,
    cas_attempts: usize,
}

impl SledRequestStore {
    /// Opens (or creates) the store under `data_directory/sled`.
    pub fn open<P: AsRef<Path>>(data_directory: P) -> DispatchResult<Self> {
        let path = data_directory.as_ref().join("sled");
        std::fs::create_dir_all(&path).map_err(|e| {
            DispatchError::StorageError(format!("Failed to create database directory at {:?}: {}", path, e))
        })?;
        info!("Opening sled request store at {:?}", path);
        let db = sled::Config::new()
            .path(&path)
            .open()
            .map_err(|e| storage_error("Failed to open sled database", e))?;
        Self::from_db(db, Some(path))
    }

    /// A throwaway store removed when dropped.
    pub fn temporary() -> DispatchResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| storage_error("Failed to open temporary sled database", e))?;
        Self::from_db(db, None)
    }

    fn from_db(db: sled::Db, path: Option<PathBuf>) -> DispatchResult<Self> {
        let requests = db
            .open_tree(REQUESTS_TREE)
            .map_err(|e| storage_error("Failed to open requests tree", e))?;
        Ok(SledRequestStore {
            db,
            requests,
            path,
            cas_attempts: MAX_CAS_ATTEMPTS,
        })
    }

    #[cfg(test)]
    fn with_cas_attempts(mut self, cas_attempts: usize) -> Self {
        self.cas_attempts = cas_attempts;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn decode(bytes: &[u8]) -> DispatchResult<EmergencyRequest> {
        serde_json::from_slice(bytes).map_err(DispatchError::from)
    }

    fn encode(request: &EmergencyRequest) -> DispatchResult<Vec<u8>> {
        serde_json::to_vec(request).map_err(DispatchError::from)
    }
}

#[async_trait]
impl RequestStore for SledRequestStore {
    async fn create(&self, request: NewEmergencyRequest) -> DispatchResult<EmergencyRequest> {
        request.validate()?;
        // generate_id starts at 0; ids handed to clients start at 1.
        let id = self
            .db
            .generate_id()
            .map_err(|e| storage_error("Failed to generate request id", e))?
            + 1;
        let record = EmergencyRequest::from_new(id, request, Utc::now());
        let bytes = Self::encode(&record)?;
        self.requests
            .compare_and_swap(request_key(id), None as Option<&[u8]>, Some(bytes))
            .map_err(|e| storage_error("Failed to insert request", e))?
            .map_err(|_| DispatchError::InternalError(format!("request id {} was already taken", id)))?;

        info!("Created emergency request {} for user {}", id, record.user_id);
        Ok(record)
    }

    async fn list(&self) -> DispatchResult<Vec<EmergencyRequest>> {
        let mut requests = Vec::new();
        for entry in self.requests.iter() {
            let (_, value) = entry.map_err(|e| storage_error("Failed to scan requests", e))?;
            requests.push(Self::decode(&value)?);
        }
        Ok(requests)
    }

    async fn get(&self, id: u64) -> DispatchResult<Option<EmergencyRequest>> {
        match self
            .requests
            .get(request_key(id))
            .map_err(|e| storage_error("Failed to read request", e))?
        {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn transition(&self, id: u64, patch: TransitionPatch) -> DispatchResult<EmergencyRequest> {
        let key = request_key(id);
        for attempt in 1..=self.cas_attempts {
            let current_bytes = self
                .requests
                .get(key)
                .map_err(|e| storage_error("Failed to read request", e))?
                .ok_or_else(|| DispatchError::request_not_found(id))?;
            let current = Self::decode(&current_bytes)?;
            let updated = apply_patch(&current, &patch)?;
            let updated_bytes = Self::encode(&updated)?;

            let swapped = self
                .requests
                .compare_and_swap(key, Some(&current_bytes), Some(updated_bytes))
                .map_err(|e| storage_error("Failed to commit transition", e))?;
            match swapped {
                Ok(()) => {
                    debug!("Request {} moved to version {} ({})", id, updated.version, updated.status);
                    return Ok(updated);
                }
                Err(_) => {
                    debug!("Request {} changed underneath transition, retrying (attempt {})", id, attempt);
                }
            }
        }
        // Losing every round says nothing about who holds the request, so
        // this is a retryable storage failure rather than a conflict.
        warn!("Giving up on request {} after {} contended attempts", id, self.cas_attempts);
        Err(DispatchError::StorageError(format!(
            "request {} is under heavy contention, try again",
            id
        )))
    }

    fn get_type(&self) -> &'static str {
        "sled"
    }

    async fn flush(&self) -> DispatchResult<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| storage_error("Failed to flush sled database", e))?;
        Ok(())
    }
}
