// ABOUTME: Non-fatal warnings collected during a run.
// ABOUTME: Broken locks and failed orphan deletions are reported instead of failing the run.

use serde::Serialize;

use crate::engine::SweepFailure;
use crate::state::LockInfo;

/// Collects non-fatal warnings during a run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A lock left by another run had to be broken.
    pub fn lock_broken(previous: &LockInfo) -> Self {
        Self {
            kind: WarningKind::LockBroken,
            message: format!(
                "broke lock on scope {} held by {} (pid {}) since {}",
                previous.scope, previous.holder, previous.pid, previous.started_at
            ),
        }
    }

    /// An orphaned resource could not be deleted; its record remains.
    pub fn orphan_cleanup(failure: &SweepFailure) -> Self {
        Self {
            kind: WarningKind::OrphanCleanup,
            message: format!(
                "failed to delete orphaned {} {}: {}",
                failure.resource_type, failure.id, failure.error
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// An existing scope lock was broken (stale, forced, or unreadable).
    LockBroken,
    /// An orphan's handler failed during finalize.
    OrphanCleanup,
}
