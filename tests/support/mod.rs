// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing init and fake recording providers for integration tests.

// Each test binary only uses some of these helpers, so allow dead_code.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use kiln::engine::{Context, Done, Handler, HandlerError, Phase};
use kiln::types::{ResourceId, ScopeId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("kiln=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn scope(id: &str) -> ScopeId {
    ScopeId::new(id).unwrap()
}

/// One handler invocation as seen by a fake provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub id: String,
    pub phase: Phase,
    pub properties_changed: bool,
}

/// Shared, ordered log of invocations across every fake provider.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: &ResourceId, phase: Phase, properties_changed: bool) {
        self.calls.lock().push(Call {
            id: id.to_string(),
            phase,
            properties_changed,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// `(id, phase)` pairs in invocation order.
    pub fn phases(&self) -> Vec<(String, Phase)> {
        self.calls
            .lock()
            .iter()
            .map(|call| (call.id.clone(), call.phase))
            .collect()
    }

    /// Ids invoked in delete phase, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.phase == Phase::Delete)
            .map(|call| call.id.clone())
            .collect()
    }

    pub fn count(&self, id: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.id == id).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeProps {
    pub value: String,
}

impl FakeProps {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeOutput {
    pub value: String,
    /// Bumped every time the fake actually changes the external object.
    pub generation: u32,
}

/// Well-behaved provider that records every invocation.
///
/// Updates with unchanged properties are no-ops that return the previous
/// output. Ids in `failing` make the handler fail in the listed phase.
#[derive(Debug, Clone)]
pub struct Fake {
    journal: Journal,
    failing: Arc<Mutex<HashSet<(String, Phase)>>>,
}

impl Fake {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            failing: Arc::default(),
        }
    }

    /// Make the handler fail for `id` in `phase` until `heal` is called.
    pub fn fail(&self, id: &str, phase: Phase) {
        self.failing.lock().insert((id.to_string(), phase));
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }
}

#[async_trait]
impl Handler for Fake {
    type Props = FakeProps;
    type Output = FakeOutput;

    async fn reconcile(
        &self,
        ctx: &mut Context<FakeProps, FakeOutput>,
        id: &ResourceId,
        props: &FakeProps,
    ) -> Result<Done, HandlerError> {
        self.journal
            .record(id, ctx.phase(), ctx.properties_changed());

        if self
            .failing
            .lock()
            .contains(&(id.to_string(), ctx.phase()))
        {
            return Err(format!("injected {} failure for {}", ctx.phase(), id).into());
        }

        match ctx.phase() {
            Phase::Delete => Ok(ctx.destroyed()?),
            Phase::Update if !ctx.properties_changed() => {
                let previous = ctx
                    .previous_output()
                    .cloned()
                    .ok_or("update without previous output")?;
                Ok(ctx.commit(previous)?)
            }
            Phase::Create | Phase::Update => {
                let generation = ctx.previous_output().map_or(1, |o| o.generation + 1);
                Ok(ctx.commit(FakeOutput {
                    value: props.value.clone(),
                    generation,
                })?)
            }
        }
    }
}

/// Ways a provider can misuse its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Misuse {
    /// Commit twice in create/update.
    DoubleCommit,
    /// Call commit while deleting.
    CommitInDelete,
    /// Call destroyed during create, ignore the error, then commit.
    SwallowedDestroyed,
    /// Commit, then fail.
    CommitThenFail,
}

/// Provider with a deliberate bug.
#[derive(Debug, Clone)]
pub struct Buggy {
    misuse: Misuse,
}

impl Buggy {
    pub fn new(misuse: Misuse) -> Self {
        Self { misuse }
    }
}

#[async_trait]
impl Handler for Buggy {
    type Props = FakeProps;
    type Output = FakeOutput;

    async fn reconcile(
        &self,
        ctx: &mut Context<FakeProps, FakeOutput>,
        _id: &ResourceId,
        props: &FakeProps,
    ) -> Result<Done, HandlerError> {
        let output = FakeOutput {
            value: props.value.clone(),
            generation: 1,
        };

        match (self.misuse, ctx.phase()) {
            (Misuse::DoubleCommit, _) => {
                let _first = ctx.commit(output.clone())?;
                Ok(ctx.commit(output)?)
            }
            (Misuse::CommitInDelete, Phase::Delete) => Ok(ctx.commit(output)?),
            (Misuse::SwallowedDestroyed, Phase::Create | Phase::Update) => {
                let _ = ctx.destroyed();
                Ok(ctx.commit(output)?)
            }
            (Misuse::CommitThenFail, Phase::Create | Phase::Update) => {
                let _done = ctx.commit(output)?;
                Err("failed after commit".into())
            }
            (_, Phase::Delete) => Ok(ctx.destroyed()?),
            (_, _) => Ok(ctx.commit(output)?),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseProps {
    pub engine: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseOutput {
    pub url: String,
    pub placeholder: bool,
}

/// Provider that substitutes a placeholder output when its backend is down.
#[derive(Debug, Clone, Default)]
pub struct Database {
    pub reachable: bool,
}

#[async_trait]
impl Handler for Database {
    type Props = DatabaseProps;
    type Output = DatabaseOutput;

    async fn reconcile(
        &self,
        ctx: &mut Context<DatabaseProps, DatabaseOutput>,
        id: &ResourceId,
        props: &DatabaseProps,
    ) -> Result<Done, HandlerError> {
        if ctx.phase() == Phase::Delete {
            return Ok(ctx.destroyed()?);
        }

        let output = if self.reachable {
            DatabaseOutput {
                url: format!("{}://{}.internal:5432", props.engine, id),
                placeholder: false,
            }
        } else {
            DatabaseOutput {
                url: format!("{}://placeholder", props.engine),
                placeholder: true,
            }
        };
        Ok(ctx.commit(output)?)
    }
}
