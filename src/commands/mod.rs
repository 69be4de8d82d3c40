// ABOUTME: Command module aggregator for the kiln CLI.
// ABOUTME: Resolves the project config and state store shared by every state command.

mod state;
mod unlock;

pub use state::{forget, list, list_scopes, show};
pub use unlock::unlock;

use kiln::config::Config;
use kiln::error::Result;
use kiln::state::StateStore;
use kiln::types::ScopeId;
use std::path::Path;
use std::sync::Arc;

/// Config, store, and scope of the project in `dir`.
pub struct Project {
    pub config: Config,
    pub store: Arc<dyn StateStore>,
    pub scope: ScopeId,
}

impl Project {
    /// Discover the config in `dir`, select the stage, and apply
    /// environment overrides.
    pub fn open(dir: &Path, stage: Option<&str>) -> Result<Self> {
        let config = Config::discover(dir)?.resolve(stage)?;

        let scope = config.scope_id()?;
        let store = config.open_store(dir);
        tracing::debug!("Using scope {}", scope);

        Ok(Self {
            config,
            store,
            scope,
        })
    }
}
