//! Call value objects

use serde::{Deserialize, Serialize};

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Reported by a push or the OS, starts ringing
    Incoming,
    /// Started locally by the host
    Outgoing,
}

/// Call lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Incoming call alerting the user
    Ringing,
    /// Answered locally or started locally, media not yet active
    Connecting,
    /// Audio session active
    Connected,
    /// Incoming call rejected before anyone answered
    Declined,
    /// Nobody answered within the ring timeout
    TimedOut,
    /// Hung up after the call had reached Connecting
    Ended,
}

impl CallState {
    /// Check if state transition is valid
    pub fn can_transition_to(&self, new_state: &CallState) -> bool {
        use CallState::*;

        match (self, new_state) {
            (Ringing, Connecting) => true,
            (Ringing, Declined) => true,
            (Ringing, TimedOut) => true,

            (Connecting, Connected) => true,
            (Connecting, Ended) => true,

            (Connected, Ended) => true,

            // Terminal states never move again
            (Declined | TimedOut | Ended, _) => false,

            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Declined | CallState::TimedOut | CallState::Ended)
    }

    /// Whether the call got past ringing on either side
    pub fn has_reached_connecting(&self) -> bool {
        matches!(self, CallState::Connecting | CallState::Connected)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CallState::Ringing => "Ringing",
            CallState::Connecting => "Connecting",
            CallState::Connected => "Connected",
            CallState::Declined => "Declined",
            CallState::TimedOut => "TimedOut",
            CallState::Ended => "Ended",
        }
    }

    /// Reason reported to the telephony provider when a call settles in this state
    pub fn end_reason(&self) -> Option<EndReason> {
        match self {
            CallState::Declined => Some(EndReason::Declined),
            CallState::TimedOut => Some(EndReason::Unanswered),
            CallState::Ended => Some(EndReason::LocalEnded),
            _ => None,
        }
    }
}

/// Why the native telephony session is being released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Hung up on this device
    LocalEnded,
    /// Rejected while ringing
    Declined,
    /// Ring timeout expired
    Unanswered,
    /// Other party hung up
    RemoteEnded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_state_transitions() {
        let ringing = CallState::Ringing;
        assert!(ringing.can_transition_to(&CallState::Connecting));
        assert!(ringing.can_transition_to(&CallState::Declined));
        assert!(ringing.can_transition_to(&CallState::TimedOut));
        assert!(!ringing.can_transition_to(&CallState::Connected));
        assert!(!ringing.can_transition_to(&CallState::Ended));

        let connecting = CallState::Connecting;
        assert!(connecting.can_transition_to(&CallState::Connected));
        assert!(connecting.can_transition_to(&CallState::Ended));
        assert!(!connecting.can_transition_to(&CallState::TimedOut));

        assert!(CallState::Connected.can_transition_to(&CallState::Ended));
        assert!(!CallState::Connected.can_transition_to(&CallState::Declined));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [CallState::Declined, CallState::TimedOut, CallState::Ended] {
            assert!(terminal.is_terminal());
            assert!(terminal.end_reason().is_some());
            assert!(!terminal.can_transition_to(&CallState::Ringing));
            assert!(!terminal.can_transition_to(&CallState::Connected));
        }
        assert!(!CallState::Ringing.is_terminal());
        assert_eq!(CallState::Ringing.end_reason(), None);
    }
}
