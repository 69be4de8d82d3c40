// ABOUTME: Execution context handed to a handler for one invocation.
// ABOUTME: Exposes the phase, prior state, and the two terminal actions: commit and destroyed.

use crate::types::{ResourceId, ResourceType, ScopeId};

use super::phase::Phase;

/// Misuse of a context's terminal actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("commit is not valid in {0} phase")]
    CommitInPhase(Phase),

    #[error("destroyed is not valid in {0} phase")]
    DestroyedInPhase(Phase),

    #[error("terminal action already taken for this invocation")]
    AlreadyTerminated,

    #[error("handler returned without taking a terminal action")]
    NoTerminalAction,
}

/// Proof that a handler took a terminal action.
///
/// Only a [`Context`] can produce one, so a handler cannot return successfully
/// without committing or confirming destruction.
#[derive(Debug)]
#[must_use = "return the token from the handler"]
pub struct Done {
    _private: (),
}

#[derive(Debug)]
pub(crate) enum Staged<O> {
    Pending,
    Committed(O),
    Destroyed,
}

/// Prior properties and output recorded for the resource.
#[derive(Debug, Clone)]
pub struct Previous<P, O> {
    pub properties: P,
    pub output: O,
}

/// Per-invocation context.
///
/// The context is the only way a handler affects the state store: `commit`
/// stages a new output for create/update, `destroyed` stages removal for
/// delete. The staged action is persisted only if the handler returns `Ok`.
#[derive(Debug)]
pub struct Context<P, O> {
    scope: ScopeId,
    id: ResourceId,
    resource_type: ResourceType,
    phase: Phase,
    previous: Option<Previous<P, O>>,
    properties_changed: bool,
    staged: Staged<O>,
    misuse: Option<ContextError>,
}

impl<P, O> Context<P, O> {
    pub(crate) fn new(
        scope: ScopeId,
        id: ResourceId,
        resource_type: ResourceType,
        phase: Phase,
        previous: Option<Previous<P, O>>,
        properties_changed: bool,
    ) -> Self {
        Self {
            scope,
            id,
            resource_type,
            phase,
            previous,
            properties_changed,
            staged: Staged::Pending,
            misuse: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    /// Output committed by the last successful invocation, if any.
    pub fn previous_output(&self) -> Option<&O> {
        self.previous.as_ref().map(|previous| &previous.output)
    }

    /// Properties declared at the last successful invocation, if any.
    pub fn previous_properties(&self) -> Option<&P> {
        self.previous.as_ref().map(|previous| &previous.properties)
    }

    /// Whether the declared properties differ from the recorded ones.
    ///
    /// Always true on create, and on every update when the scope forces a
    /// refresh. Handlers use this to make unchanged updates a no-op.
    pub fn properties_changed(&self) -> bool {
        self.properties_changed
    }

    /// Commit the output of a create or update.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` when called in delete phase or more than once.
    /// The misuse is also remembered, so the engine aborts the run even if the
    /// handler ignores the error.
    pub fn commit(&mut self, output: O) -> Result<Done, ContextError> {
        if self.phase == Phase::Delete {
            return Err(self.misused(ContextError::CommitInPhase(self.phase)));
        }
        if !matches!(self.staged, Staged::Pending) {
            return Err(self.misused(ContextError::AlreadyTerminated));
        }

        self.staged = Staged::Committed(output);
        Ok(Done { _private: () })
    }

    /// Confirm the resource no longer exists.
    ///
    /// Must be called in delete phase even when the external object was
    /// already gone.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` when called outside delete phase or more than once.
    pub fn destroyed(&mut self) -> Result<Done, ContextError> {
        if self.phase != Phase::Delete {
            return Err(self.misused(ContextError::DestroyedInPhase(self.phase)));
        }
        if !matches!(self.staged, Staged::Pending) {
            return Err(self.misused(ContextError::AlreadyTerminated));
        }

        self.staged = Staged::Destroyed;
        Ok(Done { _private: () })
    }

    fn misused(&mut self, error: ContextError) -> ContextError {
        // Keep the first misuse; it is the one that names the bug.
        self.misuse.get_or_insert(error);
        error
    }

    pub(crate) fn into_parts(self) -> (Staged<O>, Option<ContextError>) {
        (self.staged, self.misuse)
    }
}
