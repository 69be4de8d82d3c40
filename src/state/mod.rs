// ABOUTME: State store abstraction persisting the last successful reconciliation of each resource.
// ABOUTME: Provides in-memory and file-backed stores plus per-scope run locks.

mod error;
mod file;
mod lock;
mod memory;
mod record;

pub use error::{StoreError, StoreErrorKind};
pub use file::FileStateStore;
pub use lock::{DEFAULT_STALE_AFTER, LockInfo, ScopeLock};
pub use memory::MemoryStateStore;
pub use record::StateRecord;

use async_trait::async_trait;

use crate::types::{ResourceId, ScopeId};

/// Durable mapping from `(scope, resource id)` to the resource's last known state.
///
/// Writes are atomic per record: a reader never observes a partially written
/// record. Only the engine writes, one record at a time.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// All records of a scope, ordered by ascending sequence number.
    async fn load(&self, scope: &ScopeId) -> Result<Vec<StateRecord>, StoreError>;

    /// The record for one resource, if any.
    async fn get(&self, scope: &ScopeId, id: &ResourceId)
    -> Result<Option<StateRecord>, StoreError>;

    /// Insert or replace a record.
    async fn put(&self, scope: &ScopeId, record: StateRecord) -> Result<(), StoreError>;

    /// Remove a record, returning it if it existed.
    async fn remove(
        &self,
        scope: &ScopeId,
        id: &ResourceId,
    ) -> Result<Option<StateRecord>, StoreError>;

    /// Scopes that currently hold at least one record.
    async fn list_scopes(&self) -> Result<Vec<ScopeId>, StoreError>;

    /// Acquire the run lock for a scope.
    ///
    /// With `force`, an existing lock is broken regardless of its age.
    async fn lock(&self, scope: &ScopeId, force: bool) -> Result<ScopeLock, StoreError>;
}
