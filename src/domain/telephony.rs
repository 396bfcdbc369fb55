//! Native telephony port
//!
//! The OS call UI (CallKit / ConnectionService style) is consumed through
//! [`TelephonyProvider`]; its delegate callbacks come back as [`NativeAction`]s.

use crate::domain::call::entity::CallData;
use crate::domain::call::value_object::EndReason;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use async_trait::async_trait;

/// Outbound requests to the OS telephony layer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Show the system incoming-call UI
    async fn report_incoming(&self, call: &CallData) -> Result<()>;

    /// Register a locally started call with the system
    async fn report_outgoing(&self, call: &CallData) -> Result<()>;

    async fn report_connected(&self, id: CallId) -> Result<()>;

    async fn set_muted(&self, id: CallId, muted: bool) -> Result<()>;

    async fn set_held(&self, id: CallId, on_hold: bool) -> Result<()>;

    /// Release the native session backing a call
    async fn release(&self, id: CallId, reason: EndReason) -> Result<()>;
}

/// Callbacks from the OS call UI, already translated out of platform types
#[derive(Debug, Clone, PartialEq)]
pub enum NativeAction {
    /// User answered from the system UI
    Answer(CallId),
    /// User hung up or rejected from the system UI
    End(CallId),
    SetHeld { id: CallId, on_hold: bool },
    SetMuted { id: CallId, muted: bool },
    SetGroup { id: CallId, group_with: Option<CallId> },
    PlayDtmf { id: CallId, digits: String, kind: i64 },
    /// The system gave up waiting on a call action
    TimedOut(CallId),
    AudioSessionActivated,
    AudioSessionDeactivated,
    /// The provider dropped all its calls
    ProviderReset,
}
