// ABOUTME: Scope identifier naming one run's set of resources in the state store.
// ABOUTME: Restricted to filename-safe characters since the file backend keys on it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScopeIdError {
    #[error("scope id cannot be empty")]
    Empty,

    #[error("scope id exceeds maximum length of 128 characters")]
    TooLong,

    #[error("scope id cannot start with a dot")]
    StartsWithDot,

    #[error("invalid character in scope id: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(value: &str) -> Result<Self, ScopeIdError> {
        if value.is_empty() {
            return Err(ScopeIdError::Empty);
        }

        if value.len() > 128 {
            return Err(ScopeIdError::TooLong);
        }

        if value.starts_with('.') {
            return Err(ScopeIdError::StartsWithDot);
        }

        // Valid characters: alphanumeric, hyphen, underscore, dot
        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
                return Err(ScopeIdError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    /// Scope id for an app deployed to a stage, e.g. `shop-prod`.
    pub fn for_stage(app: &str, stage: &str) -> Result<Self, ScopeIdError> {
        Self::new(&format!("{app}-{stage}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ScopeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScopeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(&value).map_err(serde::de::Error::custom)
    }
}
