//! Telephony provider implementations
//!
//! [`HeadlessTelephonyProvider`] stands in for the OS call UI on platforms
//! without one. It keeps track of the native sessions it was asked to open so
//! releases can be checked against them.

use crate::domain::call::entity::CallData;
use crate::domain::call::value_object::EndReason;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use crate::domain::telephony::TelephonyProvider;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Native session as the headless provider sees it
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSession {
    pub caller: Option<String>,
    pub video: bool,
    pub connected: bool,
    pub muted: bool,
    pub on_hold: bool,
}

#[derive(Default, Clone)]
pub struct HeadlessTelephonyProvider {
    sessions: Arc<RwLock<HashMap<CallId, NativeSession>>>,
}

impl HeadlessTelephonyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session(&self, id: CallId) -> Option<NativeSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn open(&self, call: &CallData) {
        let session = NativeSession {
            caller: call.name_caller.clone(),
            video: call.is_video(),
            connected: false,
            muted: false,
            on_hold: false,
        };
        self.sessions.write().await.insert(call.id, session);
    }

    async fn update(&self, id: CallId, apply: impl FnOnce(&mut NativeSession)) {
        match self.sessions.write().await.get_mut(&id) {
            Some(session) => apply(session),
            None => warn!("No native session for call {}", id),
        }
    }
}

#[async_trait]
impl TelephonyProvider for HeadlessTelephonyProvider {
    async fn report_incoming(&self, call: &CallData) -> Result<()> {
        info!(
            "Native incoming call {} from {}",
            call.id,
            call.name_caller.as_deref().unwrap_or("unknown")
        );
        self.open(call).await;
        Ok(())
    }

    async fn report_outgoing(&self, call: &CallData) -> Result<()> {
        info!(
            "Native outgoing call {} to {}",
            call.id,
            call.handle.as_deref().unwrap_or("unknown")
        );
        self.open(call).await;
        Ok(())
    }

    async fn report_connected(&self, id: CallId) -> Result<()> {
        debug!("Native call {} connected", id);
        self.update(id, |session| session.connected = true).await;
        Ok(())
    }

    async fn set_muted(&self, id: CallId, muted: bool) -> Result<()> {
        self.update(id, |session| session.muted = muted).await;
        Ok(())
    }

    async fn set_held(&self, id: CallId, on_hold: bool) -> Result<()> {
        self.update(id, |session| {
            session.on_hold = on_hold;
            session.muted = on_hold;
        })
        .await;
        Ok(())
    }

    async fn release(&self, id: CallId, reason: EndReason) -> Result<()> {
        if self.sessions.write().await.remove(&id).is_some() {
            info!("Native call {} released ({:?})", id, reason);
        } else {
            debug!("Native call {} already released", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let provider = HeadlessTelephonyProvider::new();
        let data = CallData::new(CallId::new()).with_caller("Alice", "100");

        provider.report_incoming(&data).await.unwrap();
        provider.set_held(data.id, true).await.unwrap();
        let session = provider.session(data.id).await.unwrap();
        assert!(session.on_hold && session.muted);
        assert_eq!(session.caller.as_deref(), Some("Alice"));

        provider.release(data.id, EndReason::LocalEnded).await.unwrap();
        assert_eq!(provider.session_count().await, 0);
        // Releasing twice is harmless
        provider.release(data.id, EndReason::LocalEnded).await.unwrap();
    }
}
