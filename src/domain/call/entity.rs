//! Call entities

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Call description supplied by the host or carried in a push payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallData {
    pub id: CallId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_caller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// 0 = audio, anything else = video
    #[serde(default, rename = "type")]
    pub call_type: u8,
    /// Ring timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default)]
    pub headers: Map<String, Value>,
}

impl CallData {
    pub fn new(id: CallId) -> Self {
        Self {
            id,
            name_caller: None,
            app_name: None,
            avatar: None,
            handle: None,
            call_type: 0,
            duration: None,
            extra: Map::new(),
            headers: Map::new(),
        }
    }

    pub fn with_caller(mut self, name: impl Into<String>, handle: impl Into<String>) -> Self {
        self.name_caller = Some(name.into());
        self.handle = Some(handle.into());
        self
    }

    pub fn with_duration(mut self, millis: u64) -> Self {
        self.duration = Some(millis);
        self
    }

    /// Decode host options. A missing or malformed `id` is a configuration error.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| DomainError::Configuration(format!("Invalid call data: {}", e)))
    }

    /// Decode a call description embedded as a JSON string (push payloads)
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| DomainError::Configuration(format!("Invalid call data: {}", e)))
    }

    pub fn is_video(&self) -> bool {
        self.call_type > 0
    }

    /// Ring timeout: the caller-supplied duration, else `fallback`
    pub fn ring_timeout(&self, fallback: Duration) -> Duration {
        match self.duration {
            Some(millis) if millis > 0 => Duration::from_millis(millis),
            _ => fallback,
        }
    }

    /// Raw ICE-server list a push may carry in `extra.server`
    pub fn ice_servers_hint(&self) -> Option<&str> {
        self.extra.get("server").and_then(Value::as_str)
    }

    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
