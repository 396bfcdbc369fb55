//! Outbound host events
//!
//! Every event the crate publishes to the host carries one of a fixed set of
//! names. Three of them (incoming, accept, ended) survive a detached host bridge
//! as pending events, see [`PendingCategory`].

use crate::domain::shared::events::{DomainEvent, EventMetadata};
use crate::domain::shared::value_objects::CallId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Host-visible event vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "incoming")]
    Incoming,
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "accept")]
    Accept,
    #[serde(rename = "decline")]
    Decline,
    #[serde(rename = "ended")]
    Ended,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "mute-toggle")]
    MuteToggle,
    #[serde(rename = "hold-toggle")]
    HoldToggle,
    /// Spelled the way host apps already subscribe to it
    #[serde(rename = "dmtf")]
    Dmtf,
    #[serde(rename = "group-toggle")]
    GroupToggle,
    #[serde(rename = "audio-session-toggle")]
    AudioSessionToggle,
    #[serde(rename = "custom")]
    Custom,
    #[serde(rename = "token-update")]
    TokenUpdate,
    #[serde(rename = "token-error")]
    TokenError,
    #[serde(rename = "ice-candidate")]
    IceCandidate,
    #[serde(rename = "connection-state-change")]
    ConnectionStateChange,
    #[serde(rename = "data-received")]
    DataReceived,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Incoming => "incoming",
            EventName::Start => "start",
            EventName::Accept => "accept",
            EventName::Decline => "decline",
            EventName::Ended => "ended",
            EventName::Timeout => "timeout",
            EventName::MuteToggle => "mute-toggle",
            EventName::HoldToggle => "hold-toggle",
            EventName::Dmtf => "dmtf",
            EventName::GroupToggle => "group-toggle",
            EventName::AudioSessionToggle => "audio-session-toggle",
            EventName::Custom => "custom",
            EventName::TokenUpdate => "token-update",
            EventName::TokenError => "token-error",
            EventName::IceCandidate => "ice-candidate",
            EventName::ConnectionStateChange => "connection-state-change",
            EventName::DataReceived => "data-received",
        }
    }

    /// Category kept while the host is detached; `None` means the event is dropped
    pub fn pending_category(&self) -> Option<PendingCategory> {
        match self {
            EventName::Incoming => Some(PendingCategory::Incoming),
            EventName::Accept => Some(PendingCategory::Accept),
            EventName::Ended => Some(PendingCategory::Ended),
            _ => None,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buffered event categories, in flush order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingCategory {
    Incoming,
    Accept,
    Ended,
}

impl PendingCategory {
    pub const FLUSH_ORDER: [PendingCategory; 3] = [
        PendingCategory::Incoming,
        PendingCategory::Accept,
        PendingCategory::Ended,
    ];
}

/// An event addressed to the host app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    pub metadata: EventMetadata,
    pub name: EventName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
    pub payload: Value,
}

impl HostEvent {
    pub fn new(name: EventName, payload: Value) -> Self {
        Self {
            metadata: EventMetadata::new(name.as_str()),
            name,
            call_id: None,
            payload,
        }
    }

    pub fn for_call(name: EventName, call_id: CallId, payload: Value) -> Self {
        Self {
            call_id: Some(call_id),
            ..Self::new(name, payload)
        }
    }
}

impl DomainEvent for HostEvent {
    fn event_type(&self) -> &'static str {
        self.name.as_str()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }
}
