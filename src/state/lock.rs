// ABOUTME: Scope lock preventing concurrent runs against the same scope.
// ABOUTME: File locks use atomic create_new; in-memory locks use a shared set. Released on drop.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;

use crate::types::ScopeId;

use super::error::{LockContendedSnafu, LockHeldSnafu, LockSnafu, SerializeSnafu, StoreError};

/// Locks older than this are considered abandoned.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Information about who holds a scope lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    pub scope: ScopeId,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(scope: &ScopeId) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            scope: scope.clone(),
        }
    }

    /// Check if this lock is older than `stale_after`.
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        (Utc::now() - self.started_at)
            .to_std()
            .map(|age| age >= stale_after)
            .unwrap_or(false)
    }

    /// Path to the lock file for a scope.
    pub fn lock_path(dir: &Path, scope: &ScopeId) -> PathBuf {
        dir.join(format!("{scope}.lock"))
    }

    fn held_error(&self) -> StoreError {
        LockHeldSnafu {
            scope: self.scope.clone(),
            holder: self.holder.clone(),
            pid: self.pid,
            started_at: self.started_at,
        }
        .build()
    }
}

enum Release {
    File(PathBuf),
    Memory {
        held: Arc<Mutex<HashSet<ScopeId>>>,
    },
    Done,
}

/// A held scope lock that releases on drop.
pub struct ScopeLock {
    scope: ScopeId,
    broken: Option<LockInfo>,
    release: Release,
}

impl std::fmt::Debug for ScopeLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeLock")
            .field("scope", &self.scope)
            .field("broken", &self.broken)
            .finish()
    }
}

impl ScopeLock {
    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    /// The lock that had to be broken to acquire this one, if any.
    pub fn broken(&self) -> Option<&LockInfo> {
        self.broken.as_ref()
    }

    /// Release the lock now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        match std::mem::replace(&mut self.release, Release::Done) {
            Release::File(path) => {
                if let Err(e) = std::fs::remove_file(&path)
                    && e.kind() != std::io::ErrorKind::NotFound
                {
                    tracing::warn!("Failed to remove lock file {}: {}", path.display(), e);
                } else {
                    tracing::debug!("Released lock {}", path.display());
                }
            }
            Release::Memory { held } => {
                held.lock().remove(&self.scope);
            }
            Release::Done => {}
        }
    }

    /// Acquire an in-process lock from a shared set of held scopes.
    pub(crate) fn acquire_memory(
        held: &Arc<Mutex<HashSet<ScopeId>>>,
        scope: &ScopeId,
        force: bool,
    ) -> Result<Self, StoreError> {
        let mut guard = held.lock();
        let broken = if guard.contains(scope) {
            if !force {
                return Err(LockInfo::new(scope).held_error());
            }
            tracing::warn!("Breaking in-process lock on scope {}", scope);
            Some(LockInfo::new(scope))
        } else {
            None
        };
        guard.insert(scope.clone());

        Ok(Self {
            scope: scope.clone(),
            broken,
            release: Release::Memory {
                held: Arc::clone(held),
            },
        })
    }

    /// Acquire a file lock in `dir`.
    ///
    /// Creation uses `create_new`, so two processes can never both succeed.
    /// Stale (older than `stale_after`), forced, and unreadable locks are broken
    /// with a warning.
    pub(crate) async fn acquire_file(
        dir: &Path,
        scope: &ScopeId,
        stale_after: Duration,
        force: bool,
    ) -> Result<Self, StoreError> {
        let path = LockInfo::lock_path(dir, scope);

        tokio::fs::create_dir_all(dir)
            .await
            .context(LockSnafu { path: dir })?;

        let info = LockInfo::new(scope);
        let body = serde_json::to_vec(&info).context(SerializeSnafu {
            scope: scope.clone(),
        })?;

        if try_create(&path, &body).await? {
            tracing::debug!("Acquired lock {}", path.display());
            return Ok(Self::file(scope, path, None));
        }

        let existing = read_lock(&path).await;
        let should_break = match &existing {
            None => {
                tracing::warn!("Lock info at {} unreadable, breaking lock", path.display());
                true
            }
            Some(existing) if force => {
                tracing::warn!(
                    "Breaking lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                true
            }
            Some(existing) if existing.is_stale(stale_after) => {
                tracing::warn!(
                    "Auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                true
            }
            Some(_) => false,
        };

        if !should_break {
            return Err(existing
                .map(|existing| existing.held_error())
                .unwrap_or_else(|| LockContendedSnafu { path: path.clone() }.build()));
        }

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        let _ = tokio::fs::remove_file(&path).await;

        if !try_create(&path, &body).await? {
            return LockContendedSnafu { path }.fail();
        }

        Ok(Self::file(scope, path, existing))
    }

    fn file(scope: &ScopeId, path: PathBuf, broken: Option<LockInfo>) -> Self {
        Self {
            scope: scope.clone(),
            broken,
            release: Release::File(path),
        }
    }
}

impl Drop for ScopeLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Atomically create the lock file. Returns false if it already exists.
async fn try_create(path: &Path, body: &[u8]) -> Result<bool, StoreError> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await;

    match file {
        Ok(mut file) => {
            file.write_all(body).await.context(LockSnafu { path })?;
            file.flush().await.context(LockSnafu { path })?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e).context(LockSnafu { path }),
    }
}

async fn read_lock(path: &Path) -> Option<LockInfo> {
    let bytes = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}
