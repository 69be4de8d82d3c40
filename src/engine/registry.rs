// ABOUTME: Resource factory: maps each type tag to exactly one handler.
// ABOUTME: Defining a type yields a typed Resource constructor used by host code inside a scope.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{ResourceId, ResourceType};

use super::context::ContextError;
use super::error::ReconcileError;
use super::handler::{Applied, ErasedHandler, Handler, Invocation, Typed, invoke};
use super::phase::{Phase, RunPhase};
use super::scope::Scope;

/// Closed registry of handlers keyed by resource type.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<HashMap<ResourceType, Arc<dyn ErasedHandler>>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.types())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `resource_type` and return its constructor.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::DuplicateType` if the type already has a handler.
    pub fn define<H: Handler>(
        &self,
        resource_type: ResourceType,
        handler: H,
    ) -> Result<Resource<H>, ReconcileError> {
        let handler = Arc::new(handler);
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&resource_type) {
            return Err(ReconcileError::DuplicateType(resource_type));
        }
        handlers.insert(
            resource_type.clone(),
            Arc::new(Typed(Arc::clone(&handler))),
        );
        tracing::debug!("Defined resource type {}", resource_type);

        Ok(Resource {
            resource_type,
            handler,
        })
    }

    /// Whether a handler is defined for `resource_type`.
    pub fn contains(&self, resource_type: &ResourceType) -> bool {
        self.handlers.read().contains_key(resource_type)
    }

    /// All defined types, sorted.
    pub fn types(&self) -> Vec<ResourceType> {
        let mut types: Vec<_> = self.handlers.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub(crate) fn lookup(&self, resource_type: &ResourceType) -> Option<Arc<dyn ErasedHandler>> {
        self.handlers.read().get(resource_type).cloned()
    }
}

/// Constructor for resources of one type.
///
/// Calling [`Resource::apply`] inside a scope is the only way to reconcile a
/// declared resource.
pub struct Resource<H> {
    resource_type: ResourceType,
    handler: Arc<H>,
}

impl<H> Clone for Resource<H> {
    fn clone(&self) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H> fmt::Debug for Resource<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("resource_type", &self.resource_type)
            .finish()
    }
}

impl<H: Handler> Resource<H> {
    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    /// Declare resource `id` with `props` in `scope` and reconcile it.
    ///
    /// Registers the id in the scope, selects create or update from the
    /// stored record, invokes the handler, and persists its commit. Returns the
    /// committed output.
    ///
    /// # Errors
    ///
    /// - `DuplicateId` if `id` was already declared in this run; the handler is
    ///   not invoked.
    /// - `Handler` if the handler fails; nothing is persisted.
    /// - `InvalidContextUse` if the handler misused its context.
    /// - `WrongPhase` in a destroy scope, `ScopeFinalized` after finalize.
    pub async fn apply(
        &self,
        scope: &Scope,
        id: &str,
        props: H::Props,
    ) -> Result<H::Output, ReconcileError> {
        if scope.run_phase() == RunPhase::Destroy {
            return Err(ReconcileError::WrongPhase {
                operation: "declare resources",
                phase: RunPhase::Destroy,
            });
        }

        let id = ResourceId::new(id)?;
        let sequence = scope.register(&id, &self.resource_type)?;

        let prior = scope.store().get(scope.id(), &id).await?;
        if let Some(record) = &prior
            && record.resource_type != self.resource_type
        {
            return Err(ReconcileError::TypeChanged {
                id,
                stored: record.resource_type.clone(),
                declared: self.resource_type.clone(),
            });
        }

        // A record keeps the position it was created at, so a later resource
        // that fails its update still sorts after the ones it depends on.
        let sequence = prior.as_ref().map_or(sequence, |record| record.sequence);

        let phase = Phase::select(scope.run_phase(), prior.is_some(), false);
        tracing::info!(
            scope = %scope.id(),
            resource = %id,
            resource_type = %self.resource_type,
            %phase,
            "Reconciling resource"
        );

        let invocation = Invocation {
            store: scope.store().as_ref(),
            scope: scope.id(),
            id: &id,
            resource_type: &self.resource_type,
            phase,
            sequence,
            force_refresh: scope.force_refresh(),
        };

        match invoke(self.handler.as_ref(), invocation, &props, prior.as_ref()).await {
            Ok(Applied::Committed { output, value }) => {
                scope.complete(&id, phase, value);
                Ok(output)
            }
            Ok(Applied::Destroyed) => Err(ReconcileError::InvalidContextUse {
                id,
                source: ContextError::DestroyedInPhase(phase),
            }),
            Err(e) => {
                tracing::error!(resource = %id, "Reconciliation failed: {}", e);
                Err(e)
            }
        }
    }
}
