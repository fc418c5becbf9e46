// lib/src/storage_engine/inmemory_storage.rs
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use tokio::sync::Mutex;

use models::{
    DispatchError, DispatchResult, EmergencyRequest, NewEmergencyRequest, TransitionPatch,
};

use super::storage_engine::RequestStore;
use crate::dispatch::apply_patch;

type Snapshot = Arc<BTreeMap<u64, EmergencyRequest>>;

/// Process-local request store. Writers take `writer` and publish a fresh
/// immutable snapshot; readers only clone the current snapshot pointer, so
/// they never wait on a write in progress.
#[derive(Debug, Clone)]
pub struct InMemoryRequestStore {
    snapshot: Arc<RwLock<Snapshot>>,
    // Guards the next id and serializes every write.
    writer: Arc<Mutex<u64>>,
}

impl Default for InMemoryRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        InMemoryRequestStore {
            snapshot: Arc::new(RwLock::new(Arc::new(BTreeMap::new()))),
            writer: Arc::new(Mutex::new(1)),
        }
    }

    fn current(&self) -> DispatchResult<Snapshot> {
        self.snapshot
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|e| DispatchError::LockError(e.to_string()))
    }

    fn publish(&self, next: BTreeMap<u64, EmergencyRequest>) -> DispatchResult<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|e| DispatchError::LockError(e.to_string()))?;
        *guard = Arc::new(next);
        Ok(())
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn create(&self, request: NewEmergencyRequest) -> DispatchResult<EmergencyRequest> {
        request.validate()?;
        let mut next_id = self.writer.lock().await;
        let id = *next_id;
        let record = EmergencyRequest::from_new(id, request, Utc::now());

        let mut next = (*self.current()?).clone();
        next.insert(id, record.clone());
        self.publish(next)?;
        *next_id += 1;

        info!("Created emergency request {} for user {}", id, record.user_id);
        Ok(record)
    }

    async fn list(&self) -> DispatchResult<Vec<EmergencyRequest>> {
        Ok(self.current()?.values().cloned().collect())
    }

    async fn get(&self, id: u64) -> DispatchResult<Option<EmergencyRequest>> {
        Ok(self.current()?.get(&id).cloned())
    }

    async fn transition(&self, id: u64, patch: TransitionPatch) -> DispatchResult<EmergencyRequest> {
        let _writer = self.writer.lock().await;
        let snapshot = self.current()?;
        let current = snapshot
            .get(&id)
            .ok_or_else(|| DispatchError::request_not_found(id))?;
        let updated = apply_patch(current, &patch)?;

        let mut next = (*snapshot).clone();
        next.insert(id, updated.clone());
        self.publish(next)?;

        debug!("Request {} moved to version {} ({})", id, updated.version, updated.status);
        Ok(updated)
    }

    fn get_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryRequestStore;
    use std::sync::Arc;

    crate::store_test_impl!(Arc::new(InMemoryRequestStore::new()));
}
