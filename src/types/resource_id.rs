// ABOUTME: User-supplied resource identifier, unique within a scope.
// ABOUTME: Identifies one logical resource instance across runs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum ResourceIdError {
    #[error("resource id cannot be empty")]
    Empty,

    #[error("resource id exceeds maximum length of 255 characters")]
    TooLong,

    #[error("control character in resource id: {0:?}")]
    ControlChar(char),
}

/// Identifier of one resource instance within a scope.
///
/// Reusing the same id in a later run refers to the same instance, which is
/// how the engine finds the prior record and selects `update` over `create`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(value: &str) -> Result<Self, ResourceIdError> {
        if value.is_empty() {
            return Err(ResourceIdError::Empty);
        }

        if value.chars().count() > MAX_LEN {
            return Err(ResourceIdError::TooLong);
        }

        if let Some(c) = value.chars().find(|c| c.is_control()) {
            return Err(ResourceIdError::ControlChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(&value).map_err(serde::de::Error::custom)
    }
}
