// ABOUTME: Engine entry point and run driver.
// ABOUTME: Locks a scope, runs host declarations or a full destroy, and reports the outcome.

use std::sync::Arc;

use serde::Serialize;

use crate::diagnostics::{Diagnostics, Warning};
use crate::state::StateStore;
use crate::types::{ResourceId, ResourceType, ScopeId};

use super::error::ReconcileError;
use super::handler::Handler;
use super::phase::{Phase, RunPhase};
use super::registry::{Registry, Resource};
use super::scope::{LiveResource, Scope};
use super::sweep::{SweepResult, sweep};

/// Options for [`Engine::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Break an existing scope lock regardless of its age.
    pub force_lock: bool,
    /// Report every update as a property change.
    pub force_refresh: bool,
}

/// What happened to one resource during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub id: ResourceId,
    pub action: Action,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scope: ScopeId,
    pub phase: RunPhase,
    /// Resources reconciled in an up run, in registration order.
    pub live: Vec<LiveResource>,
    /// Orphans (up) or all records (destroy) that were deleted or failed.
    pub deleted: SweepResult,
    pub warnings: Vec<Warning>,
}

impl RunReport {
    /// Per-resource outcomes: reconciled resources first, then deletions.
    pub fn outcomes(&self) -> Vec<Outcome> {
        let reconciled = self.live.iter().map(|resource| Outcome {
            id: resource.id.clone(),
            action: match resource.phase {
                Phase::Create => Action::Created,
                Phase::Update => Action::Updated,
                Phase::Delete => Action::Deleted,
            },
        });
        let deleted = self.deleted.destroyed.iter().map(|id| Outcome {
            id: id.clone(),
            action: Action::Deleted,
        });
        reconciled.chain(deleted).collect()
    }

    /// Committed output of a live resource.
    pub fn output(&self, id: &str) -> Option<&serde_json::Value> {
        self.live
            .iter()
            .find(|resource| resource.id.as_str() == id)
            .map(|resource| &resource.output)
    }

    /// False when any orphan or destroy deletion failed. An up run with
    /// failed orphan deletions still returns `Ok`, so check this.
    pub fn all_succeeded(&self) -> bool {
        self.deleted.all_succeeded()
    }
}

/// Reconciliation engine: a handler registry bound to a state store.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn StateStore>,
    registry: Arc<Registry>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(store: impl StateStore + 'static) -> Self {
        Self::with_store(Arc::new(store))
    }

    pub fn with_store(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            registry: Arc::new(Registry::new()),
        }
    }

    /// Define a resource type. See [`Registry::define`].
    pub fn define<H: Handler>(
        &self,
        resource_type: &str,
        handler: H,
    ) -> Result<Resource<H>, ReconcileError> {
        self.registry
            .define(ResourceType::new(resource_type)?, handler)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Open a scope, snapshotting its stored records.
    ///
    /// Does not take the scope lock; [`Engine::run`] does.
    pub async fn scope(
        &self,
        scope_id: &ScopeId,
        phase: RunPhase,
    ) -> Result<Scope, ReconcileError> {
        let snapshot = self.store.load(scope_id).await?;
        tracing::debug!(
            "Opened scope {} with {} stored record(s)",
            scope_id,
            snapshot.len()
        );
        Ok(Scope::new(
            scope_id.clone(),
            phase,
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            snapshot,
        ))
    }

    /// Run `declare` against a locked scope.
    ///
    /// - `up`: runs `declare`, then finalizes the scope. The first error
    ///   aborts the run; resources committed before it stay committed.
    ///   Orphans that fail to delete do not fail the run: they are listed in
    ///   `RunReport::deleted.failed` and as warnings, and their records stay
    ///   for the next run. Callers must check [`RunReport::all_succeeded`].
    /// - `destroy`: ignores `declare` and deletes every record, last
    ///   created first. Every record is attempted; failures are returned
    ///   together as `DestroyIncomplete` and their records remain.
    ///
    /// The scope lock is held for the whole run and released before
    /// returning, whatever the outcome.
    pub async fn run<F>(
        &self,
        scope_id: &ScopeId,
        phase: RunPhase,
        options: RunOptions,
        declare: F,
    ) -> Result<RunReport, ReconcileError>
    where
        F: AsyncFnOnce(&Scope) -> Result<(), ReconcileError>,
    {
        tracing::info!(scope = %scope_id, %phase, "Starting run");
        let mut diagnostics = Diagnostics::default();

        let lock = self.store.lock(scope_id, options.force_lock).await?;
        if let Some(previous) = lock.broken() {
            diagnostics.warn(Warning::lock_broken(previous));
        }

        let outcome = self
            .run_locked(scope_id, phase, options, declare, &mut diagnostics)
            .await;
        lock.release();
        let (live, deleted) = outcome?;

        tracing::info!(
            scope = %scope_id,
            %phase,
            "Run complete: {} live, {} deleted",
            live.len(),
            deleted.destroyed.len()
        );

        Ok(RunReport {
            scope: scope_id.clone(),
            phase,
            live,
            deleted,
            warnings: diagnostics.into_warnings(),
        })
    }

    async fn run_locked<F>(
        &self,
        scope_id: &ScopeId,
        phase: RunPhase,
        options: RunOptions,
        declare: F,
        diagnostics: &mut Diagnostics,
    ) -> Result<(Vec<LiveResource>, SweepResult), ReconcileError>
    where
        F: AsyncFnOnce(&Scope) -> Result<(), ReconcileError>,
    {
        let scope = self
            .scope(scope_id, phase)
            .await?
            .with_force_refresh(options.force_refresh);

        match phase {
            RunPhase::Up => {
                declare(&scope).await?;
                let finalized = scope.finalize().await?;
                for failure in &finalized.orphans.failed {
                    diagnostics.warn(Warning::orphan_cleanup(failure));
                }
                Ok((finalized.live, finalized.orphans))
            }
            RunPhase::Destroy => {
                let records = scope.snapshot().iter().rev().cloned();
                let result =
                    sweep(&self.registry, self.store.as_ref(), scope_id, records).await?;
                if !result.all_succeeded() {
                    return Err(ReconcileError::DestroyIncomplete {
                        scope: scope_id.clone(),
                        failures: result.failed,
                    });
                }
                Ok((Vec::new(), result))
            }
        }
    }

    /// Delete every resource of a scope.
    pub async fn destroy(&self, scope_id: &ScopeId) -> Result<RunReport, ReconcileError> {
        self.run(
            scope_id,
            RunPhase::Destroy,
            RunOptions::default(),
            async |_: &Scope| Ok(()),
        )
        .await
    }
}
