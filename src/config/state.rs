// ABOUTME: State backend and scope lock settings.
// ABOUTME: Builds the configured StateStore relative to the project directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::state::{DEFAULT_STALE_AFTER, FileStateStore, MemoryStateStore, StateStore};

pub const DEFAULT_STATE_DIR: &str = ".kiln/state";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    /// Process-local, lost on exit. Useful for tests and dry runs.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_stale_after", with = "humantime_serde")]
    pub stale_after: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after: default_stale_after(),
        }
    }
}

fn default_stale_after() -> Duration {
    DEFAULT_STALE_AFTER
}

impl StateConfig {
    /// State directory, resolved against `base` when relative.
    pub fn resolve_dir(&self, base: &Path) -> PathBuf {
        if self.dir.is_absolute() {
            self.dir.clone()
        } else {
            base.join(&self.dir)
        }
    }

    pub fn open_store(&self, base: &Path, lock: &LockConfig) -> Arc<dyn StateStore> {
        match self.backend {
            Backend::File => Arc::new(
                FileStateStore::new(self.resolve_dir(base)).with_stale_after(lock.stale_after),
            ),
            Backend::Memory => Arc::new(MemoryStateStore::new()),
        }
    }
}
