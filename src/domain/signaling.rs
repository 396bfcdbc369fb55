//! Signaling types and the peer-connection port
//!
//! The crate does not implement WebRTC. It drives a platform peer connection
//! through [`PeerConnection`] and receives its callbacks as [`PeerEvent`]s.

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// STUN/TURN server entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// Parse a host-supplied server list.
    ///
    /// Entries without usable `urls` are skipped. Anything other than an array
    /// is a configuration error.
    pub fn parse_list(value: &Value) -> Result<Vec<IceServer>> {
        let entries = value.as_array().ok_or_else(|| {
            DomainError::Configuration("ICE servers must be a list".to_string())
        })?;

        Ok(entries.iter().filter_map(Self::parse_entry).collect())
    }

    /// Same as [`IceServer::parse_list`] for a list embedded as a JSON string
    pub fn parse_json_str(raw: &str) -> Result<Vec<IceServer>> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| DomainError::Configuration(format!("Invalid ICE server JSON: {}", e)))?;
        Self::parse_list(&value)
    }

    fn parse_entry(entry: &Value) -> Option<IceServer> {
        let urls: Vec<String> = match entry.get("urls")? {
            Value::String(url) => vec![url.clone()],
            Value::Array(urls) => urls
                .iter()
                .filter_map(|u| u.as_str().map(str::to_string))
                .collect(),
            _ => return None,
        };
        if urls.is_empty() {
            return None;
        }

        let field = |name: &str| entry.get(name).and_then(Value::as_str).map(str::to_string);
        Some(IceServer {
            urls,
            username: field("username"),
            credential: field("credential"),
        })
    }
}

/// SDP type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SdpType {
    Offer,
    PrAnswer,
    Answer,
    Rollback,
}

impl SdpType {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "offer" => Ok(SdpType::Offer),
            "prAnswer" | "pranswer" => Ok(SdpType::PrAnswer),
            "answer" => Ok(SdpType::Answer),
            "rollback" => Ok(SdpType::Rollback),
            other => Err(DomainError::Configuration(format!(
                "Unknown SDP type: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::PrAnswer => "prAnswer",
            SdpType::Answer => "answer",
            SdpType::Rollback => "rollback",
        }
    }
}

/// Session description exchanged with the remote side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
}

impl SessionDescription {
    pub fn new(sdp_type: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            sdp_type,
        }
    }
}

/// ICE candidate in the shape the host exchanges with its signaling server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: String,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: u16,
}

/// Peer connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    /// No further signaling is accepted in this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PeerConnectionState::Disconnected
                | PeerConnectionState::Failed
                | PeerConnectionState::Closed
        )
    }

    /// States after which the bridge closes the connection itself
    pub fn requires_close(&self) -> bool {
        matches!(
            self,
            PeerConnectionState::Disconnected | PeerConnectionState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeerConnectionState::New => "new",
            PeerConnectionState::Connecting => "connecting",
            PeerConnectionState::Connected => "connected",
            PeerConnectionState::Disconnected => "disconnected",
            PeerConnectionState::Failed => "failed",
            PeerConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for PeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callbacks raised by a peer connection
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    LocalCandidate(IceCandidate),
    StateChanged(PeerConnectionState),
    DataReceived(Vec<u8>),
}

pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;

/// A single platform peer connection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Create an offer and apply it as the local description
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Create an answer and apply it as the local description
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    async fn has_remote_description(&self) -> bool;

    fn state(&self) -> PeerConnectionState;

    async fn close(&self) -> Result<()>;
}

/// Builds peer connections wired to an event sink
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[IceServer],
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerConnection>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ice_servers() {
        let servers = IceServer::parse_list(&json!([
            { "urls": ["stun:stun.example.com:3478"] },
            { "urls": "turn:turn.example.com", "username": "u", "credential": "p" },
            { "username": "no-urls" },
            { "urls": [] }
        ]))
        .unwrap();

        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].urls, vec!["stun:stun.example.com:3478"]);
        assert_eq!(servers[1].username.as_deref(), Some("u"));
        assert_eq!(servers[1].credential.as_deref(), Some("p"));
    }

    #[test]
    fn test_malformed_ice_servers() {
        assert!(matches!(
            IceServer::parse_list(&json!({ "urls": "stun:x" })),
            Err(DomainError::Configuration(_))
        ));
        assert!(IceServer::parse_json_str("not json").is_err());
        assert_eq!(
            IceServer::parse_json_str(r#"[{"urls":["stun:a"]}]"#).unwrap(),
            vec![IceServer::new("stun:a")]
        );
    }

    #[test]
    fn test_sdp_type() {
        assert_eq!(SdpType::parse("offer").unwrap(), SdpType::Offer);
        assert_eq!(SdpType::parse("prAnswer").unwrap(), SdpType::PrAnswer);
        assert!(SdpType::parse("bogus").is_err());

        let desc = SessionDescription::new(SdpType::Answer, "v=0");
        assert_eq!(serde_json::to_value(&desc).unwrap(), json!({ "sdp": "v=0", "type": "answer" }));
    }

    #[test]
    fn test_candidate_field_names() {
        let candidate = IceCandidate {
            candidate: "candidate:1 1 udp 2122260223 10.0.0.1 54321 typ host".to_string(),
            sdp_mid: "0".to_string(),
            sdp_m_line_index: 0,
        };
        let value = serde_json::to_value(&candidate).unwrap();
        assert!(value.get("sdpMid").is_some());
        assert!(value.get("sdpMLineIndex").is_some());
    }

    #[test]
    fn test_connection_state_classification() {
        assert!(PeerConnectionState::Failed.requires_close());
        assert!(PeerConnectionState::Disconnected.requires_close());
        assert!(!PeerConnectionState::Closed.requires_close());
        assert!(PeerConnectionState::Closed.is_terminal());
        assert!(!PeerConnectionState::Connected.is_terminal());
    }
}
