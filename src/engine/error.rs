// ABOUTME: Error types for resource reconciliation.
// ABOUTME: Separates engine-level errors (always fatal) from handler failures (fatal on up, recorded on destroy).

use crate::state::StoreError;
use crate::types::{ResourceId, ResourceIdError, ResourceType, ResourceTypeError, ScopeId};

use super::context::ContextError;
use super::phase::{Phase, RunPhase};

/// Error raised by a handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while defining or reconciling resources.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A second handler was defined for a type tag.
    #[error("a handler is already defined for resource type {0}")]
    DuplicateType(ResourceType),

    /// The same resource id was declared twice in one run.
    #[error("resource {id} is already declared in scope {scope}")]
    DuplicateId { scope: ScopeId, id: ResourceId },

    /// A handler misused its context (provider bug).
    #[error("resource {id} misused its context: {source}")]
    InvalidContextUse {
        id: ResourceId,
        #[source]
        source: ContextError,
    },

    /// A handler failed before its terminal action took effect.
    #[error("{phase} of {resource_type} {id} failed: {source}")]
    Handler {
        id: ResourceId,
        resource_type: ResourceType,
        phase: Phase,
        #[source]
        source: HandlerError,
    },

    /// A stored record names a type with no handler.
    #[error("no handler defined for resource type {resource_type} (resource {id})")]
    UnknownType {
        id: ResourceId,
        resource_type: ResourceType,
    },

    /// A resource id was redeclared with a different type than its record.
    #[error("resource {id} is recorded as {stored} but declared as {declared}")]
    TypeChanged {
        id: ResourceId,
        stored: ResourceType,
        declared: ResourceType,
    },

    /// Stored properties or output do not decode into the handler's types.
    #[error("stored state for resource {id} does not match its handler: {source}")]
    StateDecode {
        id: ResourceId,
        #[source]
        source: serde_json::Error,
    },

    /// Declared properties or a committed output could not be serialized.
    #[error("failed to serialize state for resource {id}: {source}")]
    Encode {
        id: ResourceId,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid resource id: {0}")]
    InvalidId(#[from] ResourceIdError),

    #[error("invalid resource type: {0}")]
    InvalidType(#[from] ResourceTypeError),

    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// Some resources could not be deleted; their records remain.
    #[error("{}", destroy_message(.scope, .failures))]
    DestroyIncomplete {
        scope: ScopeId,
        failures: Vec<SweepFailure>,
    },

    #[error("scope {0} has already been finalized")]
    ScopeFinalized(ScopeId),

    /// An operation was attempted in a run phase that does not support it.
    #[error("cannot {operation} during a {phase} run")]
    WrongPhase {
        operation: &'static str,
        phase: RunPhase,
    },
}

/// A resource that failed to delete during a destroy or orphan sweep.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SweepFailure {
    pub id: ResourceId,
    pub resource_type: ResourceType,
    pub error: String,
}

fn destroy_message(scope: &ScopeId, failures: &[SweepFailure]) -> String {
    let mut message = format!(
        "failed to destroy {} resource(s) in scope {}",
        failures.len(),
        scope
    );
    for failure in failures {
        message.push_str(&format!(
            "\n  {} ({}): {}",
            failure.id, failure.resource_type, failure.error
        ));
    }
    message
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileErrorKind {
    DuplicateType,
    DuplicateId,
    InvalidContextUse,
    HandlerFailure,
    UnknownType,
    TypeChanged,
    State,
    InvalidInput,
    Store,
    DestroyIncomplete,
    ScopeMisuse,
}

impl ReconcileError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ReconcileErrorKind {
        match self {
            ReconcileError::DuplicateType(_) => ReconcileErrorKind::DuplicateType,
            ReconcileError::DuplicateId { .. } => ReconcileErrorKind::DuplicateId,
            ReconcileError::InvalidContextUse { .. } => ReconcileErrorKind::InvalidContextUse,
            ReconcileError::Handler { .. } => ReconcileErrorKind::HandlerFailure,
            ReconcileError::UnknownType { .. } => ReconcileErrorKind::UnknownType,
            ReconcileError::TypeChanged { .. } => ReconcileErrorKind::TypeChanged,
            ReconcileError::StateDecode { .. } | ReconcileError::Encode { .. } => {
                ReconcileErrorKind::State
            }
            ReconcileError::InvalidId(_) | ReconcileError::InvalidType(_) => {
                ReconcileErrorKind::InvalidInput
            }
            ReconcileError::Store(_) => ReconcileErrorKind::Store,
            ReconcileError::DestroyIncomplete { .. } => ReconcileErrorKind::DestroyIncomplete,
            ReconcileError::ScopeFinalized(_) | ReconcileError::WrongPhase { .. } => {
                ReconcileErrorKind::ScopeMisuse
            }
        }
    }

    /// Whether this is a provider failure rather than an engine-level error.
    pub fn is_handler_failure(&self) -> bool {
        matches!(self, ReconcileError::Handler { .. })
    }

    /// Whether a sweep records this error against one resource and moves on.
    ///
    /// Provider failures and records the engine cannot interpret (no handler
    /// for the type, undecodable state) leave only that record behind. Context
    /// misuse and store errors abort the sweep.
    pub fn is_per_resource_failure(&self) -> bool {
        matches!(
            self,
            ReconcileError::Handler { .. }
                | ReconcileError::UnknownType { .. }
                | ReconcileError::StateDecode { .. }
        )
    }

    /// The resource this error is about, when there is one.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        match self {
            ReconcileError::DuplicateId { id, .. }
            | ReconcileError::InvalidContextUse { id, .. }
            | ReconcileError::Handler { id, .. }
            | ReconcileError::UnknownType { id, .. }
            | ReconcileError::TypeChanged { id, .. }
            | ReconcileError::StateDecode { id, .. }
            | ReconcileError::Encode { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Failures of an incomplete destroy, empty for other errors.
    pub fn sweep_failures(&self) -> &[SweepFailure] {
        match self {
            ReconcileError::DestroyIncomplete { failures, .. } => failures,
            _ => &[],
        }
    }
}
