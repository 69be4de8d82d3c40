// ABOUTME: Resource type tag such as "docker::Container".
// ABOUTME: Exactly one handler may be registered per tag in a registry.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum ResourceTypeError {
    #[error("resource type cannot be empty")]
    Empty,

    #[error("resource type exceeds maximum length of 128 characters")]
    TooLong,

    #[error("invalid character in resource type: {0:?}")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(value: &str) -> Result<Self, ResourceTypeError> {
        if value.is_empty() {
            return Err(ResourceTypeError::Empty);
        }

        if value.chars().count() > MAX_LEN {
            return Err(ResourceTypeError::TooLong);
        }

        if let Some(c) = value
            .chars()
            .find(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ResourceTypeError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Provider namespace, the part before the first `::` if any.
    ///
    /// `"docker::Container"` yields `Some("docker")`.
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once("::").map(|(ns, _)| ns)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ResourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(&value).map_err(serde::de::Error::custom)
    }
}
