//! Push notification handling
//!
//! Stores the VoIP push token, reports registration failures, and turns push
//! payloads into incoming calls or remote hang-ups.

use crate::application::coordinator::CallCoordinator;
use crate::application::signaling::SignalingBridge;
use crate::config::TokenErrorPolicy;
use crate::domain::call::entity::CallData;
use crate::domain::call::event::{EventName, HostEvent};
use crate::domain::push::{SettingsStore, PUSH_TOKEN_KEY};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::signaling::IceServer;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What part of a push payload turned into
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Incoming(CallData),
    Ended(CallData),
}

#[derive(Clone)]
pub struct PushService {
    coordinator: CallCoordinator,
    settings: Arc<dyn SettingsStore>,
    signaling: Option<SignalingBridge>,
    token_error_policy: TokenErrorPolicy,
}

impl PushService {
    pub fn new(
        coordinator: CallCoordinator,
        settings: Arc<dyn SettingsStore>,
        token_error_policy: TokenErrorPolicy,
    ) -> Self {
        Self {
            coordinator,
            settings,
            signaling: None,
            token_error_policy,
        }
    }

    /// Rebuild the peer connection from ICE servers carried in call pushes
    pub fn with_signaling(mut self, signaling: SignalingBridge) -> Self {
        self.signaling = Some(signaling);
        self
    }

    /// Persist a freshly issued token and publish it
    pub async fn set_push_token(&self, token: &str) -> Result<()> {
        self.settings.set(PUSH_TOKEN_KEY, token).await?;
        info!("VoIP push token updated");

        self.coordinator
            .dispatcher()
            .emit(HostEvent::new(
                EventName::TokenUpdate,
                json!({ "value": token }),
            ))
            .await;
        Ok(())
    }

    /// Stored token, or an empty string when none was issued yet
    pub async fn push_token(&self) -> Result<String> {
        Ok(self.settings.get(PUSH_TOKEN_KEY).await?.unwrap_or_default())
    }

    pub async fn on_registration_error(&self, error: &str) {
        warn!("Push registration failed: {}", error);
        if self.token_error_policy == TokenErrorPolicy::Emit {
            self.coordinator
                .dispatcher()
                .emit(HostEvent::new(
                    EventName::TokenError,
                    json!({ "error": error }),
                ))
                .await;
        }
    }

    /// Act on a received push payload.
    ///
    /// `deleteCall` holds the JSON of a call the remote side hung up and is
    /// handled first; `call` holds the JSON of a call to ring. A payload may
    /// carry both. A `deleteCall` for a call that is already gone is skipped.
    pub async fn handle_push_payload(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<Vec<PushOutcome>> {
        let mut outcomes = Vec::new();

        if let Some(raw) = payload.get("deleteCall") {
            let data = Self::decode(raw)?;
            debug!("Push ending call {}", data.id);
            match self.coordinator.end_remote_call(data.id).await {
                Ok(_) => outcomes.push(PushOutcome::Ended(data)),
                Err(e) if e.is_neutral() => debug!("Push deleteCall skipped: {}", e),
                Err(e) => return Err(e),
            }
        }

        if let Some(raw) = payload.get("call") {
            let data = Self::decode(raw)?;
            if let Some(servers) = data.ice_servers_hint() {
                self.recreate_peer(servers).await;
            }
            debug!("Push for incoming call {}", data.id);
            self.coordinator.show_incoming(data.clone()).await?;
            outcomes.push(PushOutcome::Incoming(data));
        }

        if outcomes.is_empty() {
            debug!("Push payload without a call to act on");
        }
        Ok(outcomes)
    }

    fn decode(raw: &Value) -> Result<CallData> {
        match raw {
            Value::String(text) => CallData::from_json_str(text),
            Value::Object(_) => CallData::from_value(raw.clone()),
            _ => Err(DomainError::Configuration(
                "Push call must be a JSON object or string".to_string(),
            )),
        }
    }

    async fn recreate_peer(&self, raw: &str) {
        let Some(signaling) = &self.signaling else {
            return;
        };
        match IceServer::parse_json_str(raw) {
            Ok(servers) => {
                if let Err(e) = signaling.create_peer(Some(servers)).await {
                    warn!("Peer connection from push failed: {}", e);
                }
            }
            Err(e) => warn!("Ignoring ICE servers in push: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::EventDispatcher;
    use crate::config::CoordinatorConfig;
    use crate::domain::host::MockHostBridge;
    use crate::domain::push::MockSettingsStore;
    use crate::domain::shared::value_objects::CallId;
    use crate::domain::telephony::MockTelephonyProvider;

    fn coordinator() -> CallCoordinator {
        let mut telephony = MockTelephonyProvider::new();
        telephony.expect_report_incoming().returning(|_| Ok(()));
        telephony.expect_release().returning(|_, _| Ok(()));
        CallCoordinator::new(
            CoordinatorConfig::default(),
            EventDispatcher::new(),
            Arc::new(telephony),
        )
    }

    #[tokio::test]
    async fn test_token_is_persisted_under_voip_key() {
        let mut settings = MockSettingsStore::new();
        settings
            .expect_set()
            .withf(|key, value| key == PUSH_TOKEN_KEY && value == "abc123")
            .times(1)
            .returning(|_, _| Ok(()));
        settings.expect_get().returning(|_| Ok(None));

        let service = PushService::new(coordinator(), Arc::new(settings), TokenErrorPolicy::Emit);
        service.set_push_token("abc123").await.unwrap();
        assert_eq!(service.push_token().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_call_push_rings() {
        let coordinator = coordinator();
        let service = PushService::new(
            coordinator.clone(),
            Arc::new(MockSettingsStore::new()),
            TokenErrorPolicy::Emit,
        );
        let id = CallId::new();
        let mut payload = Map::new();
        payload.insert(
            "call".to_string(),
            Value::String(json!({ "id": id.to_string(), "nameCaller": "Bob" }).to_string()),
        );

        let outcomes = service.handle_push_payload(&payload).await.unwrap();
        assert!(matches!(outcomes.as_slice(), [PushOutcome::Incoming(data)] if data.id == id));
        assert!(coordinator.get_call(id).await.is_some());

        let mut payload = Map::new();
        payload.insert("deleteCall".to_string(), json!({ "id": id.to_string() }));
        service.handle_push_payload(&payload).await.unwrap();
        assert!(coordinator.get_call(id).await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_push_is_configuration_error() {
        let service = PushService::new(
            coordinator(),
            Arc::new(MockSettingsStore::new()),
            TokenErrorPolicy::Emit,
        );
        let mut payload = Map::new();
        payload.insert("call".to_string(), json!(42));

        assert!(matches!(
            service.handle_push_payload(&payload).await,
            Err(DomainError::Configuration(_))
        ));
        assert!(service.handle_push_payload(&Map::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_then_ring_in_one_payload() {
        let coordinator = coordinator();
        let service = PushService::new(
            coordinator.clone(),
            Arc::new(MockSettingsStore::new()),
            TokenErrorPolicy::Emit,
        );
        let old = CallId::new();
        coordinator.show_incoming(CallData::new(old)).await.unwrap();

        let new = CallId::new();
        let mut payload = Map::new();
        payload.insert("call".to_string(), json!({ "id": new.to_string() }));
        payload.insert("deleteCall".to_string(), json!({ "id": old.to_string() }));

        let outcomes = service.handle_push_payload(&payload).await.unwrap();
        assert!(matches!(
            outcomes.as_slice(),
            [PushOutcome::Ended(ended), PushOutcome::Incoming(ringing)]
                if ended.id == old && ringing.id == new
        ));
        assert!(coordinator.get_call(old).await.is_none());
        assert!(coordinator.get_call(new).await.is_some());
    }

    #[tokio::test]
    async fn test_stale_delete_still_rings() {
        let coordinator = coordinator();
        let service = PushService::new(
            coordinator.clone(),
            Arc::new(MockSettingsStore::new()),
            TokenErrorPolicy::Emit,
        );
        let new = CallId::new();
        let mut payload = Map::new();
        payload.insert("deleteCall".to_string(), json!({ "id": CallId::new().to_string() }));
        payload.insert("call".to_string(), json!({ "id": new.to_string() }));

        let outcomes = service.handle_push_payload(&payload).await.unwrap();
        assert!(matches!(outcomes.as_slice(), [PushOutcome::Incoming(data)] if data.id == new));
    }

    #[tokio::test]
    async fn test_token_error_policy() {
        for (policy, deliveries) in [(TokenErrorPolicy::Emit, 1), (TokenErrorPolicy::Swallow, 0)] {
            let mut bridge = MockHostBridge::new();
            bridge.expect_is_alive().return_const(true);
            bridge
                .expect_deliver()
                .withf(|event| event.name == EventName::TokenError)
                .times(deliveries)
                .returning(|_| Ok(()));

            let coordinator = coordinator();
            coordinator.dispatcher().attach(Arc::new(bridge)).await;
            let service =
                PushService::new(coordinator, Arc::new(MockSettingsStore::new()), policy);
            service.on_registration_error("no entitlement").await;
        }
    }
}
