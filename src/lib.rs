// ABOUTME: Library root for kiln, a declarative resource reconciliation engine.
// ABOUTME: Hosts define resource types, declare them in a scope, and the engine reconciles state.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod output;
pub mod state;
pub mod types;

pub use engine::{
    Context, Done, Engine, Handler, HandlerError, Phase, ReconcileError, Resource, RunOptions,
    RunPhase, RunReport, Scope,
};
