//! Plugin request/response DTOs

use crate::domain::call::event::HostEvent;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use crate::domain::signaling::{IceCandidate, IceServer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a host method call; the host resolves or rejects its promise on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginResponse {
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginResponse {
    pub fn resolve(data: Value) -> Self {
        Self {
            resolved: true,
            data: Some(data),
            error: None,
        }
    }

    /// Resolved without a value
    pub fn neutral() -> Self {
        Self {
            resolved: true,
            data: None,
            error: None,
        }
    }

    pub fn reject(message: String) -> Self {
        Self {
            resolved: false,
            data: None,
            error: Some(message),
        }
    }
}

/// `{ "id": ... }` options shared by per-call methods
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallIdOptions {
    pub id: CallId,
    #[serde(default)]
    pub is_muted: Option<bool>,
    #[serde(default)]
    pub is_on_hold: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServerOptions {
    #[serde(default)]
    pub ice_servers: Option<Value>,
}

impl IceServerOptions {
    /// Parsed server list, or `None` when the host sent none
    pub fn servers(&self) -> Result<Option<Vec<IceServer>>> {
        self.ice_servers
            .as_ref()
            .filter(|value| !value.is_null())
            .map(IceServer::parse_list)
            .transpose()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSdpOptions {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
    #[serde(flatten)]
    pub ice: IceServerOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateOptions {
    pub candidate: String,
    pub sdp_mid: String,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: u16,
}

impl From<CandidateOptions> for IceCandidate {
    fn from(options: CandidateOptions) -> Self {
        IceCandidate {
            candidate: options.candidate,
            sdp_mid: options.sdp_mid,
            sdp_m_line_index: options.sdp_m_line_index,
        }
    }
}

/// Decode method options, treating bad input as a configuration error
pub fn parse_options<T: serde::de::DeserializeOwned>(options: Value) -> Result<T> {
    serde_json::from_value(options)
        .map_err(|e| DomainError::Configuration(format!("Invalid options: {}", e)))
}

/// Event as handed to host listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub body: Value,
}

impl From<&HostEvent> for EventEnvelope {
    fn from(event: &HostEvent) -> Self {
        Self {
            event: event.name.as_str().to_string(),
            body: event.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_shape() {
        let response = serde_json::to_value(PluginResponse::neutral()).unwrap();
        assert_eq!(response, json!({ "resolved": true }));

        let response = serde_json::to_value(PluginResponse::reject("boom".to_string())).unwrap();
        assert_eq!(response, json!({ "resolved": false, "error": "boom" }));
    }

    #[test]
    fn test_ice_server_options() {
        let options: IceServerOptions = parse_options(json!({})).unwrap();
        assert_eq!(options.servers().unwrap(), None);

        let options: IceServerOptions =
            parse_options(json!({ "iceServers": [{ "urls": "stun:a" }] })).unwrap();
        assert_eq!(options.servers().unwrap().unwrap().len(), 1);

        let options: IceServerOptions = parse_options(json!({ "iceServers": "stun:a" })).unwrap();
        assert!(matches!(options.servers(), Err(DomainError::Configuration(_))));
    }

    #[test]
    fn test_candidate_requires_every_field() {
        let result: Result<CandidateOptions> = parse_options(json!({ "candidate": "candidate:1" }));
        assert!(matches!(result, Err(DomainError::Configuration(_))));

        let options: CandidateOptions = parse_options(
            json!({ "candidate": "candidate:1", "sdpMid": "audio", "sdpMLineIndex": 1 }),
        )
        .unwrap();
        let candidate: IceCandidate = options.into();
        assert_eq!(candidate.sdp_mid, "audio");
        assert_eq!(candidate.sdp_m_line_index, 1);
    }

    #[test]
    fn test_missing_id_is_configuration_error() {
        let result: Result<CallIdOptions> = parse_options(json!({ "isMuted": true }));
        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }
}
