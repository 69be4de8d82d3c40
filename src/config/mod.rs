// ABOUTME: Configuration types and parsing for kiln.yml.
// ABOUTME: Handles YAML parsing, per-stage overrides, and environment overrides.

mod deserialize;
mod init;
mod state;

pub use init::init_config;
pub use state::{Backend, DEFAULT_STATE_DIR, LockConfig, StateConfig};

use crate::error::{Error, Result};
use crate::state::StateStore;
use crate::types::ScopeId;
use deserialize::{deserialize_app, deserialize_stage, validate_stage};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CONFIG_FILENAME: &str = "kiln.yml";
pub const CONFIG_FILENAME_ALT: &str = "kiln.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".kiln/config.yml";

pub const ENV_STAGE: &str = "KILN_STAGE";
pub const ENV_STATE_DIR: &str = "KILN_STATE_DIR";

const DEFAULT_STAGE: &str = "dev";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_app")]
    pub app: ScopeId,

    #[serde(default = "default_stage", deserialize_with = "deserialize_stage")]
    pub stage: String,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub stages: HashMap<String, StageOverride>,
}

/// Settings replaced when running against a named stage.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StageOverride {
    #[serde(default)]
    pub state: Option<StateConfig>,

    #[serde(default)]
    pub lock: Option<LockConfig>,
}

fn default_stage() -> String {
    DEFAULT_STAGE.to_string()
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Path of the first config file present in `dir`.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            None => Err(Error::ConfigNotFound(dir.to_path_buf())),
        }
    }

    /// Select `stage`, applying its overrides when the config declares any.
    ///
    /// Stages without an entry in `stages` use the top-level settings.
    pub fn for_stage(&self, stage: &str) -> Result<Config> {
        validate_stage(stage).map_err(Error::InvalidConfig)?;

        let mut merged = self.clone();
        merged.stage = stage.to_string();

        if let Some(overrides) = self.stages.get(stage) {
            if let Some(ref state) = overrides.state {
                merged.state = state.clone();
            }
            if let Some(ref lock) = overrides.lock {
                merged.lock = lock.clone();
            }
        }

        Ok(merged)
    }

    /// Apply `KILN_STAGE` and `KILN_STATE_DIR` from the environment.
    pub fn with_env_overrides(self) -> Result<Config> {
        self.resolve(None)
    }

    /// Select the stage and apply environment overrides.
    ///
    /// An explicit `stage` wins over `KILN_STAGE`. `KILN_STATE_DIR` is applied
    /// last, so it also wins over a stage-specific directory.
    pub fn resolve(self, stage: Option<&str>) -> Result<Config> {
        let env_stage = std::env::var(ENV_STAGE).ok().filter(|s| !s.is_empty());
        let mut config = match stage.or(env_stage.as_deref()) {
            Some(stage) => self.for_stage(stage)?,
            None => self,
        };

        if let Ok(dir) = std::env::var(ENV_STATE_DIR)
            && !dir.is_empty()
        {
            config.state.dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Scope id for the selected stage: `<app>-<stage>`.
    pub fn scope_id(&self) -> Result<ScopeId> {
        ScopeId::for_stage(self.app.as_str(), &self.stage)
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Open the configured state store, resolving a relative state dir
    /// against `base`.
    pub fn open_store(&self, base: &Path) -> Arc<dyn StateStore> {
        self.state.open_store(base, &self.lock)
    }
}
