// ABOUTME: Phase selection for a single resource invocation.
// ABOUTME: Pure function of the run phase, prior record presence, and orphan status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The action one resource invocation must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Create,
    Update,
    Delete,
}

/// The overall direction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// Reconcile declared resources and prune orphans.
    Up,
    /// Tear down every recorded resource of the scope.
    Destroy,
}

impl Phase {
    /// Select the phase for one invocation.
    ///
    /// Destroy runs and orphans always delete. Otherwise a prior record means
    /// update, even when properties are unchanged; handlers decide whether an
    /// update is a no-op.
    pub fn select(run_phase: RunPhase, has_prior: bool, orphan: bool) -> Phase {
        match (run_phase, has_prior, orphan) {
            (RunPhase::Destroy, _, _) | (_, _, true) => Phase::Delete,
            (RunPhase::Up, true, false) => Phase::Update,
            (RunPhase::Up, false, false) => Phase::Create,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Create => "create",
            Phase::Update => "update",
            Phase::Delete => "delete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Up => f.write_str("up"),
            RunPhase::Destroy => f.write_str("destroy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_apply_creates() {
        assert_eq!(Phase::select(RunPhase::Up, false, false), Phase::Create);
    }

    #[test]
    fn reapply_updates() {
        assert_eq!(Phase::select(RunPhase::Up, true, false), Phase::Update);
    }

    #[test]
    fn orphan_deletes_during_up() {
        assert_eq!(Phase::select(RunPhase::Up, true, true), Phase::Delete);
    }

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Update).unwrap(), "\"update\"");
        assert_eq!(RunPhase::Destroy.to_string(), "destroy");
    }

    fn run_phase() -> impl Strategy<Value = RunPhase> {
        prop_oneof![Just(RunPhase::Up), Just(RunPhase::Destroy)]
    }

    proptest! {
        #[test]
        fn destroy_run_always_deletes(has_prior in any::<bool>(), orphan in any::<bool>()) {
            prop_assert_eq!(Phase::select(RunPhase::Destroy, has_prior, orphan), Phase::Delete);
        }

        #[test]
        fn create_only_without_prior(run in run_phase(), has_prior in any::<bool>(), orphan in any::<bool>()) {
            if Phase::select(run, has_prior, orphan) == Phase::Create {
                prop_assert!(!has_prior);
                prop_assert_eq!(run, RunPhase::Up);
                prop_assert!(!orphan);
            }
        }
    }
}
