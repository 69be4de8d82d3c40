// ABOUTME: In-memory state store for tests and ephemeral runs.
// ABOUTME: Records live only as long as the store value.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::types::{ResourceId, ScopeId};

use super::error::StoreError;
use super::lock::ScopeLock;
use super::record::{StateRecord, sort_by_sequence};
use super::StateStore;

#[derive(Default)]
pub struct MemoryStateStore {
    scopes: Mutex<HashMap<ScopeId, BTreeMap<ResourceId, StateRecord>>>,
    locks: Arc<Mutex<HashSet<ScopeId>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held for a scope.
    pub fn len(&self, scope: &ScopeId) -> usize {
        self.scopes.lock().get(scope).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, scope: &ScopeId) -> bool {
        self.len(scope) == 0
    }
}

impl std::fmt::Debug for MemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStateStore")
            .field("scopes", &self.scopes.lock().len())
            .finish()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, scope: &ScopeId) -> Result<Vec<StateRecord>, StoreError> {
        let mut records: Vec<StateRecord> = self
            .scopes
            .lock()
            .get(scope)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        sort_by_sequence(&mut records);
        Ok(records)
    }

    async fn get(
        &self,
        scope: &ScopeId,
        id: &ResourceId,
    ) -> Result<Option<StateRecord>, StoreError> {
        Ok(self
            .scopes
            .lock()
            .get(scope)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn put(&self, scope: &ScopeId, record: StateRecord) -> Result<(), StoreError> {
        self.scopes
            .lock()
            .entry(scope.clone())
            .or_default()
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn remove(
        &self,
        scope: &ScopeId,
        id: &ResourceId,
    ) -> Result<Option<StateRecord>, StoreError> {
        let mut scopes = self.scopes.lock();
        let Some(records) = scopes.get_mut(scope) else {
            return Ok(None);
        };
        let removed = records.remove(id);
        if records.is_empty() {
            scopes.remove(scope);
        }
        Ok(removed)
    }

    async fn list_scopes(&self) -> Result<Vec<ScopeId>, StoreError> {
        let mut scopes: Vec<ScopeId> = self.scopes.lock().keys().cloned().collect();
        scopes.sort();
        Ok(scopes)
    }

    async fn lock(&self, scope: &ScopeId, force: bool) -> Result<ScopeLock, StoreError> {
        ScopeLock::acquire_memory(&self.locks, scope, force)
    }
}
