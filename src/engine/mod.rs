// ABOUTME: Resource reconciliation engine: registry, scopes, handler contexts, and run driver.
// ABOUTME: Exports the host-facing API for defining resource types and running declarations.

mod context;
mod error;
mod handler;
mod phase;
mod registry;
mod run;
mod scope;
mod sweep;

pub use context::{Context, ContextError, Done, Previous};
pub use error::{HandlerError, ReconcileError, ReconcileErrorKind, SweepFailure};
pub use handler::Handler;
pub use phase::{Phase, RunPhase};
pub use registry::{Registry, Resource};
pub use run::{Action, Engine, Outcome, RunOptions, RunReport};
pub use scope::{Finalized, LiveResource, Scope};
pub use sweep::SweepResult;
