// lib/src/storage_engine/storage_engine.rs

use async_trait::async_trait;

use models::{DispatchResult, EmergencyRequest, NewEmergencyRequest, TransitionPatch};

/// The authority every client polls. Engines serialize conflicting writes to
/// the same request and validate each one through `dispatch::apply_patch`.
#[async_trait]
pub trait RequestStore: Send + Sync + 'static {
    /// Appends a new PENDING request and returns it with its assigned id.
    async fn create(&self, request: NewEmergencyRequest) -> DispatchResult<EmergencyRequest>;

    /// Full snapshot in insertion order.
    async fn list(&self) -> DispatchResult<Vec<EmergencyRequest>>;

    async fn get(&self, id: u64) -> DispatchResult<Option<EmergencyRequest>>;

    /// Applies `patch` atomically. Fails with `DispatchError::Conflict` when a
    /// write-once field is already set or the status would not move forward.
    async fn transition(&self, id: u64, patch: TransitionPatch) -> DispatchResult<EmergencyRequest>;

    fn get_type(&self) -> &'static str;

    async fn flush(&self) -> DispatchResult<()> {
        Ok(())
    }
}
