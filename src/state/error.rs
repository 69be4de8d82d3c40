// ABOUTME: State backend error types with SNAFU context selectors.
// ABOUTME: Carries the file path or scope involved so failures are actionable.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use snafu::Snafu;

use crate::types::ScopeId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("failed to read state file {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to write state file {}: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("corrupt state file {}: {source}", path.display()))]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("failed to serialize state for scope {scope}: {source}"))]
    Serialize {
        scope: ScopeId,
        source: serde_json::Error,
    },

    #[snafu(display("scope {scope} is locked by {holder} (pid {pid}) since {started_at}"))]
    LockHeld {
        scope: ScopeId,
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[snafu(display("lock {} was taken by another process while breaking it", path.display()))]
    LockContended { path: PathBuf },

    #[snafu(display("failed to acquire lock {}: {source}", path.display()))]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Reading or writing the backing storage failed.
    Io,
    /// Stored data could not be decoded or encoded.
    Format,
    /// Another run holds the scope lock.
    Locked,
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::Read { .. } | StoreError::Write { .. } | StoreError::Lock { .. } => {
                StoreErrorKind::Io
            }
            StoreError::Corrupt { .. } | StoreError::Serialize { .. } => StoreErrorKind::Format,
            StoreError::LockHeld { .. } | StoreError::LockContended { .. } => {
                StoreErrorKind::Locked
            }
        }
    }
}
