// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Validates the app name and stage names at parse time.

use serde::Deserialize;

use crate::types::ScopeId;

/// App names become the prefix of scope ids, so they must be valid scope ids.
pub fn deserialize_app<'de, D>(deserializer: D) -> Result<ScopeId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ScopeId::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_stage<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    validate_stage(&s).map_err(serde::de::Error::custom)?;
    Ok(s)
}

pub fn validate_stage(stage: &str) -> Result<(), String> {
    if stage.is_empty() {
        return Err("stage cannot be empty".to_string());
    }
    if let Some(c) = stage
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(format!("stage {stage:?} contains invalid character {c:?}"));
    }
    Ok(())
}
