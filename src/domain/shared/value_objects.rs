//! Shared value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Call identifier
///
/// Serialized as the hyphenated UUID string the host and the OS telephony layer
/// both use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse a host-supplied identifier. Case-insensitive.
    pub fn parse(value: &str) -> Result<Self, String> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|e| format!("Invalid call id '{}': {}", value, e))
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for CallId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
