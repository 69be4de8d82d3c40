// ABOUTME: Scope: the ordered set of resources declared in one run.
// ABOUTME: Assigns registration sequence numbers, detects orphans, and finalizes the run.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::state::{StateRecord, StateStore};
use crate::types::{ResourceId, ResourceType, ScopeId};

use super::error::ReconcileError;
use super::phase::{Phase, RunPhase};
use super::registry::Registry;
use super::sweep::{SweepResult, sweep};

/// A resource that was reconciled during the run, with its committed output.
#[derive(Debug, Clone, Serialize)]
pub struct LiveResource {
    pub id: ResourceId,
    pub resource_type: ResourceType,
    pub phase: Phase,
    pub output: serde_json::Value,
}

/// Result of [`Scope::finalize`].
#[derive(Debug)]
#[must_use = "orphan sweep failures are reported here"]
pub struct Finalized {
    /// Outputs of the run, in registration order.
    pub live: Vec<LiveResource>,
    /// Outcome of deleting orphaned records.
    pub orphans: SweepResult,
}

#[derive(Debug)]
struct Registration {
    id: ResourceId,
    resource_type: ResourceType,
    completed: Option<(Phase, serde_json::Value)>,
}

#[derive(Debug, Default)]
struct Registrations {
    entries: Vec<Registration>,
    finalized: bool,
}

/// The resources belonging to one run.
///
/// Created by [`Engine::scope`](super::Engine::scope) and passed explicitly to
/// every resource constructor. Registration is append-only; concurrent
/// constructions share the scope by reference.
pub struct Scope {
    id: ScopeId,
    run_phase: RunPhase,
    store: Arc<dyn StateStore>,
    registry: Arc<Registry>,
    snapshot: Vec<StateRecord>,
    base_sequence: u64,
    force_refresh: bool,
    registrations: Mutex<Registrations>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("run_phase", &self.run_phase)
            .field("snapshot", &self.snapshot.len())
            .field("registered", &self.registrations.lock().entries.len())
            .finish()
    }
}

impl Scope {
    pub(crate) fn new(
        id: ScopeId,
        run_phase: RunPhase,
        store: Arc<dyn StateStore>,
        registry: Arc<Registry>,
        snapshot: Vec<StateRecord>,
    ) -> Self {
        // New registrations sort after every record from earlier runs.
        let base_sequence = snapshot
            .iter()
            .map(|record| record.sequence + 1)
            .max()
            .unwrap_or(0);

        Self {
            id,
            run_phase,
            store,
            registry,
            snapshot,
            base_sequence,
            force_refresh: false,
            registrations: Mutex::new(Registrations::default()),
        }
    }

    /// Report every update as a property change, so handlers refresh even
    /// when declared properties are unchanged.
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn id(&self) -> &ScopeId {
        &self.id
    }

    pub fn run_phase(&self) -> RunPhase {
        self.run_phase
    }

    pub fn force_refresh(&self) -> bool {
        self.force_refresh
    }

    pub(crate) fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Records present when the scope was opened, in registration order.
    pub fn snapshot(&self) -> &[StateRecord] {
        &self.snapshot
    }

    /// Ids registered so far, in registration order.
    pub fn registered(&self) -> Vec<ResourceId> {
        self.registrations
            .lock()
            .entries
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Append `id` to the run and return the sequence number it takes if it
    /// is created in this run.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if `id` is already registered, `ScopeFinalized` after
    /// [`Scope::finalize`].
    pub fn register(
        &self,
        id: &ResourceId,
        resource_type: &ResourceType,
    ) -> Result<u64, ReconcileError> {
        let mut registrations = self.registrations.lock();
        if registrations.finalized {
            return Err(ReconcileError::ScopeFinalized(self.id.clone()));
        }
        if registrations.entries.iter().any(|entry| &entry.id == id) {
            return Err(ReconcileError::DuplicateId {
                scope: self.id.clone(),
                id: id.clone(),
            });
        }

        let sequence = self.base_sequence + registrations.entries.len() as u64;
        registrations.entries.push(Registration {
            id: id.clone(),
            resource_type: resource_type.clone(),
            completed: None,
        });
        Ok(sequence)
    }

    pub(crate) fn complete(&self, id: &ResourceId, phase: Phase, output: serde_json::Value) {
        let mut registrations = self.registrations.lock();
        if let Some(entry) = registrations
            .entries
            .iter_mut()
            .find(|entry| &entry.id == id)
        {
            entry.completed = Some((phase, output));
        }
    }

    /// Snapshot records not registered in this run, in registration order.
    pub fn orphans(&self) -> Vec<StateRecord> {
        let registered: HashSet<ResourceId> = self.registered().into_iter().collect();
        self.snapshot
            .iter()
            .filter(|record| !registered.contains(&record.id))
            .cloned()
            .collect()
    }

    /// Finish an up run: delete orphans and return the live outputs.
    ///
    /// Orphans are deleted sequentially, last registered first. A failure on
    /// one orphan (handler error, unknown type, undecodable state) is recorded
    /// in the result and the sweep moves on; context misuse and store errors
    /// abort.
    ///
    /// # Errors
    ///
    /// `WrongPhase` in a destroy scope, `ScopeFinalized` if called twice, and
    /// any misuse or store error raised while deleting orphans.
    pub async fn finalize(&self) -> Result<Finalized, ReconcileError> {
        if self.run_phase != RunPhase::Up {
            return Err(ReconcileError::WrongPhase {
                operation: "finalize a scope",
                phase: self.run_phase,
            });
        }

        {
            let mut registrations = self.registrations.lock();
            if registrations.finalized {
                return Err(ReconcileError::ScopeFinalized(self.id.clone()));
            }
            registrations.finalized = true;
        }

        let orphans = self.orphans();
        if !orphans.is_empty() {
            tracing::info!(
                scope = %self.id,
                "Removing {} orphaned resource(s)",
                orphans.len()
            );
        }

        // Skip records another path already removed since the snapshot.
        let mut current = Vec::with_capacity(orphans.len());
        for orphan in orphans {
            if let Some(record) = self.store.get(&self.id, &orphan.id).await? {
                current.push(record);
            }
        }

        let orphans = sweep(
            &self.registry,
            self.store.as_ref(),
            &self.id,
            current.into_iter().rev(),
        )
        .await?;

        let live = self
            .registrations
            .lock()
            .entries
            .iter()
            .filter_map(|entry| {
                entry.completed.as_ref().map(|(phase, output)| LiveResource {
                    id: entry.id.clone(),
                    resource_type: entry.resource_type.clone(),
                    phase: *phase,
                    output: output.clone(),
                })
            })
            .collect();

        Ok(Finalized { live, orphans })
    }
}
