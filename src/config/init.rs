// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a kiln.yml template file.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ScopeId;

use super::{CONFIG_FILENAME, DEFAULT_STATE_DIR};

const DEFAULT_APP: &str = "my-app";

pub fn init_config(dir: &Path, app: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let app = ScopeId::new(app.unwrap_or(DEFAULT_APP))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;

    std::fs::write(&config_path, generate_template_yaml(&app))?;
    tracing::debug!("Wrote {}", config_path.display());

    Ok(())
}

fn generate_template_yaml(app: &ScopeId) -> String {
    format!(
        r#"app: {app}
stage: dev
state:
  backend: file
  dir: {DEFAULT_STATE_DIR}
lock:
  # Locks older than this are treated as abandoned and broken
  stale_after: 1h
# Per-stage overrides; the scope id is <app>-<stage>
# stages:
#   prod:
#     state:
#       dir: /var/lib/kiln/prod
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn template_parses_back() {
        let app = ScopeId::new("shop").unwrap();
        let config = Config::from_yaml(&generate_template_yaml(&app)).unwrap();

        assert_eq!(config.app.as_str(), "shop");
        assert_eq!(config.scope_id().unwrap().as_str(), "shop-dev");
    }
}
