//! Call aggregate root

use crate::domain::call::entity::CallData;
use crate::domain::call::event::{EventName, HostEvent};
use crate::domain::call::value_object::{CallDirection, CallState};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Call aggregate root
///
/// Owns the lifecycle of a single call. Every transition records exactly one
/// host event; the coordinator drains them with [`Call::take_events`] and hands
/// them to the dispatcher.
#[derive(Debug, Clone)]
pub struct Call {
    data: CallData,
    direction: CallDirection,
    state: CallState,
    muted: bool,
    on_hold: bool,
    /// Answered on this device
    accepted: bool,
    created_at: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    events: Vec<HostEvent>,
}

impl Call {
    /// Incoming call, reported by a push or the OS. Starts ringing.
    pub fn incoming(data: CallData) -> Self {
        let mut call = Self::with_state(data, CallDirection::Incoming, CallState::Ringing);
        call.record(EventName::Incoming, call.data.to_payload());
        call
    }

    /// Outgoing call started by the host. Starts connecting.
    pub fn outgoing(data: CallData) -> Self {
        let mut call = Self::with_state(data, CallDirection::Outgoing, CallState::Connecting);
        call.record(EventName::Start, call.data.to_payload());
        call
    }

    fn with_state(data: CallData, direction: CallDirection, state: CallState) -> Self {
        Self {
            data,
            direction,
            state,
            muted: false,
            on_hold: false,
            accepted: false,
            created_at: Utc::now(),
            connected_at: None,
            ended_at: None,
            events: Vec::new(),
        }
    }

    /// Answer the ringing call
    pub fn accept(&mut self) -> Result<()> {
        self.transition_to(CallState::Connecting)?;
        self.accepted = true;
        self.record(EventName::Accept, self.data.to_payload());
        Ok(())
    }

    /// Media session became active.
    ///
    /// Records no event: the caller decides which event reports the activation.
    pub fn connect(&mut self) -> Result<()> {
        self.transition_to(CallState::Connected)?;
        self.connected_at = Some(Utc::now());
        Ok(())
    }

    /// Ring timeout expired.
    ///
    /// Only an incoming call that is still ringing and was never answered here
    /// can time out.
    pub fn time_out(&mut self) -> Result<()> {
        if self.direction != CallDirection::Incoming || self.accepted {
            return Err(DomainError::InvalidTransition(format!(
                "Call {} cannot time out once answered or when started locally",
                self.id()
            )));
        }
        self.transition_to(CallState::TimedOut)?;
        self.ended_at = Some(Utc::now());
        self.record(EventName::Timeout, self.data.to_payload());
        Ok(())
    }

    /// End the call from whatever state it is in.
    ///
    /// A call that never got past ringing is declined, anything else is ended.
    pub fn terminate(&mut self) -> Result<CallState> {
        let target = self.termination_state();
        self.transition_to(target)?;
        self.ended_at = Some(Utc::now());
        let name = match target {
            CallState::Declined => EventName::Decline,
            _ => EventName::Ended,
        };
        self.record(name, self.data.to_payload());
        Ok(target)
    }

    /// Terminal state `terminate` would move to
    pub fn termination_state(&self) -> CallState {
        if self.has_reached_connecting() {
            CallState::Ended
        } else {
            CallState::Declined
        }
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.ensure_live("mute")?;
        self.muted = muted;
        self.record(
            EventName::MuteToggle,
            json!({ "id": self.id(), "isMuted": muted }),
        );
        Ok(())
    }

    /// Hold or resume. Holding also mutes, resuming unmutes.
    pub fn set_held(&mut self, on_hold: bool) -> Result<()> {
        self.ensure_live("hold")?;
        self.on_hold = on_hold;
        self.muted = on_hold;
        self.record(
            EventName::HoldToggle,
            json!({ "id": self.id(), "isOnHold": on_hold }),
        );
        Ok(())
    }

    /// DTMF digits played through the OS call UI
    pub fn play_dtmf(&mut self, digits: &str, kind: i64) -> Result<()> {
        self.ensure_live("play DTMF on")?;
        self.record(
            EventName::Dmtf,
            json!({ "id": self.id(), "digits": digits, "type": kind }),
        );
        Ok(())
    }

    /// Merge with (or split from, when `None`) another call
    pub fn set_group(&mut self, group_with: Option<CallId>) -> Result<()> {
        self.ensure_live("group")?;
        self.record(
            EventName::GroupToggle,
            json!({ "id": self.id(), "callUUIDToGroupWith": group_with }),
        );
        Ok(())
    }

    fn ensure_live(&self, action: &str) -> Result<()> {
        if self.state.is_terminal() {
            return Err(DomainError::InvalidTransition(format!(
                "Cannot {} call {} in state {}",
                action,
                self.id(),
                self.state.name()
            )));
        }
        Ok(())
    }

    /// Transition to a new state
    fn transition_to(&mut self, new_state: CallState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(DomainError::InvalidTransition(format!(
                "Cannot transition call {} from {:?} to {:?}",
                self.id(),
                self.state,
                new_state
            )));
        }

        self.state = new_state;
        Ok(())
    }

    fn record(&mut self, name: EventName, payload: Value) {
        let event = HostEvent::for_call(name, self.data.id, payload);
        self.events.push(event);
    }

    /// Take all pending events
    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    // Getters
    pub fn id(&self) -> CallId {
        self.data.id
    }

    pub fn data(&self) -> &CallData {
        &self.data
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_on_hold(&self) -> bool {
        self.on_hold
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Answered here, started here, or already past ringing
    pub fn has_reached_connecting(&self) -> bool {
        self.accepted
            || self.direction == CallDirection::Outgoing
            || self.state.has_reached_connecting()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Talk time, once connected and ended
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.connected_at
            .and_then(|connected| self.ended_at.map(|ended| ended - connected))
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Host-facing description: the call data plus live flags
    pub fn to_payload(&self) -> Value {
        let mut payload = self.data.to_payload();
        if let Value::Object(map) = &mut payload {
            map.insert("isMuted".to_string(), json!(self.muted));
            map.insert("isOnHold".to_string(), json!(self.on_hold));
            map.insert("isAccepted".to_string(), json!(self.accepted));
            map.insert("state".to_string(), json!(self.state));
            map.insert("direction".to_string(), json!(self.direction));
        }
        payload
    }
}
