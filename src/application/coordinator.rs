//! Call State Coordinator
//!
//! Owns the call registry and drives every call through its lifecycle:
//!
//! ```text
//! Ringing ──accept──> Connecting ──connected──> Connected
//!    │                    │                         │
//!    ├─decline─> Declined └────────hangup───────────┴──> Ended
//!    └─timeout─> TimedOut
//! ```
//!
//! Host requests and OS telephony callbacks both land here. Transitions and
//! their events happen under the registry lock; native teardown runs with the
//! lock released and the call leaves the registry only once teardown is done.

use crate::application::dispatcher::EventDispatcher;
use crate::application::signaling::SignalingBridge;
use crate::config::CoordinatorConfig;
use crate::domain::call::aggregate::Call;
use crate::domain::call::entity::CallData;
use crate::domain::call::event::{EventName, HostEvent, PendingCategory};
use crate::domain::call::registry::CallRegistry;
use crate::domain::call::value_object::{CallDirection, CallState, EndReason};
use crate::domain::callback::{DeclineCallback, HttpClient};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use crate::domain::telephony::{NativeAction, TelephonyProvider};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Default)]
struct CoordinatorState {
    registry: CallRegistry,
    /// Ring timers of incoming calls, keyed by call
    timers: HashMap<CallId, JoinHandle<()>>,
    /// Ids being reported to the provider but not registered yet
    reserved: HashSet<CallId>,
}

impl CoordinatorState {
    fn cancel_timer(&mut self, id: &CallId) {
        if let Some(timer) = self.timers.remove(id) {
            timer.abort();
            debug!("Ring timer for call {} cancelled", id);
        }
    }

    /// Claim `id` for a new call, failing if it is registered or already claimed
    fn reserve(&mut self, id: CallId) -> Result<()> {
        if self.registry.contains(&id) || !self.reserved.insert(id) {
            return Err(DomainError::AlreadyExists(id.to_string()));
        }
        Ok(())
    }

    fn record_gauge(&self) {
        metrics::gauge!("callkit_active_calls").set(self.registry.len() as f64);
    }
}

#[derive(Clone)]
pub struct CallCoordinator {
    state: Arc<RwLock<CoordinatorState>>,
    dispatcher: EventDispatcher,
    telephony: Arc<dyn TelephonyProvider>,
    signaling: Option<SignalingBridge>,
    http: Option<Arc<dyn HttpClient>>,
    config: CoordinatorConfig,
}

impl CallCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        dispatcher: EventDispatcher,
        telephony: Arc<dyn TelephonyProvider>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(CoordinatorState::default())),
            dispatcher,
            telephony,
            signaling: None,
            http: None,
            config,
        }
    }

    /// Close this bridge's peer connection whenever a call ends
    pub fn with_signaling(mut self, signaling: SignalingBridge) -> Self {
        self.signaling = Some(signaling);
        self
    }

    /// Send decline callbacks through `http`
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Report an incoming call and start its ring timer
    pub async fn show_incoming(&self, data: CallData) -> Result<()> {
        let id = data.id;
        logged("show incoming", self.state.write().await.reserve(id))?;

        let reported = self.telephony.report_incoming(&data).await;

        let mut state = self.state.write().await;
        state.reserved.remove(&id);
        logged("show incoming", reported)?;

        let ring_timeout = data.ring_timeout(self.config.default_ring_timeout());
        let mut call = Call::incoming(data);
        let events = call.take_events();
        logged("show incoming", state.registry.insert(call))?;
        let timer = self.spawn_ring_timer(id, ring_timeout);
        state.timers.insert(id, timer);
        state.record_gauge();
        info!("Incoming call {} ringing, timeout {:?}", id, ring_timeout);

        self.dispatcher.emit_all(events).await;
        Ok(())
    }

    /// Start an outgoing call
    pub async fn start_call(&self, data: CallData) -> Result<()> {
        let id = data.id;
        logged("start call", self.state.write().await.reserve(id))?;

        let reported = self.telephony.report_outgoing(&data).await;

        let mut state = self.state.write().await;
        state.reserved.remove(&id);
        logged("start call", reported)?;

        let mut call = Call::outgoing(data);
        let events = call.take_events();
        logged("start call", state.registry.insert(call))?;
        state.record_gauge();
        info!("Outgoing call {} connecting", id);

        self.dispatcher.emit_all(events).await;
        Ok(())
    }

    /// Answer a ringing call
    pub async fn accept_call(&self, id: CallId) -> Result<()> {
        let mut state = self.state.write().await;
        let call = logged("accept", state.registry.require_mut(&id))?;
        logged("accept", call.accept())?;
        let events = call.take_events();
        state.cancel_timer(&id);
        info!("Call {} accepted", id);

        self.dispatcher.emit_all(events).await;
        Ok(())
    }

    /// Hang up or decline, depending on how far the call got
    pub async fn end_call(&self, id: CallId) -> Result<CallState> {
        self.hang_up(id, false).await
    }

    /// The other party hung up or withdrew the call
    pub async fn end_remote_call(&self, id: CallId) -> Result<CallState> {
        self.hang_up(id, true).await
    }

    async fn hang_up(&self, id: CallId, remote: bool) -> Result<CallState> {
        let (outcome, callback) = {
            let mut state = self.state.write().await;
            let call = logged("end", state.registry.require_mut(&id))?;
            let outcome = logged("end", call.terminate())?;
            let callback = match outcome {
                CallState::Declined if !remote => DeclineCallback::from_call_data(call.data()),
                _ => None,
            };
            let events = call.take_events();
            state.cancel_timer(&id);
            self.dispatcher.emit_all(events).await;
            (outcome, callback)
        };
        info!("Call {} {}{}", id, outcome.name(), if remote { " by remote" } else { "" });

        if let Some(callback) = callback {
            self.send_decline_callback(id, callback);
        }

        let reason = if remote {
            EndReason::RemoteEnded
        } else {
            outcome.end_reason().unwrap_or(EndReason::LocalEnded)
        };
        self.release(id, reason).await;
        Ok(outcome)
    }

    /// Host confirms media is flowing
    pub async fn connected_call(&self, id: CallId) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let call = logged("connect", state.registry.require_mut(&id))?;
            logged("connect", call.connect())?;
            self.dispatcher.discard_pending_incoming(id).await;
        }
        info!("Call {} connected", id);

        if let Err(e) = self.telephony.report_connected(id).await {
            warn!("Reporting call {} as connected failed: {}", id, e);
        }
        Ok(())
    }

    pub async fn mute_call(&self, id: CallId, muted: bool) -> Result<()> {
        self.apply_mute(id, muted, true).await
    }

    pub async fn hold_call(&self, id: CallId, on_hold: bool) -> Result<()> {
        self.apply_hold(id, on_hold, true).await
    }

    /// End every registered call; returns how many were ended
    pub async fn end_all_calls(&self) -> usize {
        let ids: Vec<CallId> = {
            let state = self.state.read().await;
            state
                .registry
                .iter()
                .filter(|call| !call.is_terminal())
                .map(|call| call.id())
                .collect()
        };

        let mut ended = 0;
        for id in ids {
            // Concurrent teardown may already have ended it
            if self.end_call(id).await.is_ok() {
                ended += 1;
            }
        }
        info!("Ended {} calls", ended);
        ended
    }

    pub async fn active_calls(&self) -> Vec<Call> {
        let state = self.state.read().await;
        state.registry.iter().cloned().collect()
    }

    pub async fn get_call(&self, id: CallId) -> Option<Call> {
        self.state.read().await.registry.get(&id).cloned()
    }

    /// Muted flag of a call; false for unknown calls
    pub async fn is_muted(&self, id: CallId) -> bool {
        self.state
            .read()
            .await
            .registry
            .get(&id)
            .is_some_and(|call| call.is_muted())
    }

    /// Flush pending events; returns the payload of the accept event, if one was pending
    pub async fn send_pending_events(&self) -> Option<Value> {
        self.dispatcher
            .flush_pending()
            .await
            .into_iter()
            .find(|event| event.name.pending_category() == Some(PendingCategory::Accept))
            .map(|event| event.payload)
    }

    pub async fn send_custom(&self, payload: Value) {
        self.dispatcher
            .emit(HostEvent::new(EventName::Custom, payload))
            .await;
    }

    /// Entry point for OS telephony callbacks
    pub async fn handle_native_action(&self, action: NativeAction) -> Result<()> {
        debug!("Native action {:?}", action);
        match action {
            NativeAction::Answer(id) => self.accept_call(id).await,
            NativeAction::End(id) => self.end_call(id).await.map(|_| ()),
            NativeAction::SetHeld { id, on_hold } => self.apply_hold(id, on_hold, false).await,
            NativeAction::SetMuted { id, muted } => self.apply_mute(id, muted, false).await,
            NativeAction::SetGroup { id, group_with } => {
                self.record_on(id, "group", |call| call.set_group(group_with))
                    .await
            }
            NativeAction::PlayDtmf { id, digits, kind } => {
                self.record_on(id, "play DTMF", |call| call.play_dtmf(&digits, kind))
                    .await
            }
            NativeAction::TimedOut(id) => self.expire(id, false).await,
            NativeAction::AudioSessionActivated => {
                self.audio_session_activated().await;
                Ok(())
            }
            NativeAction::AudioSessionDeactivated => {
                self.audio_session_deactivated().await;
                Ok(())
            }
            NativeAction::ProviderReset => {
                warn!("Telephony provider reset, ending all calls");
                self.end_all_calls().await;
                Ok(())
            }
        }
    }

    async fn apply_mute(&self, id: CallId, muted: bool, notify_provider: bool) -> Result<()> {
        let changed = {
            let mut state = self.state.write().await;
            let call = logged("mute", state.registry.require_mut(&id))?;
            let changed = call.is_muted() != muted;
            logged("mute", call.set_muted(muted))?;
            let events = call.take_events();
            self.dispatcher.emit_all(events).await;
            changed
        };

        if notify_provider && changed {
            if let Err(e) = self.telephony.set_muted(id, muted).await {
                warn!("Muting call {} on the provider failed: {}", id, e);
            }
        }
        Ok(())
    }

    async fn apply_hold(&self, id: CallId, on_hold: bool, notify_provider: bool) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let call = logged("hold", state.registry.require_mut(&id))?;
            logged("hold", call.set_held(on_hold))?;
            let events = call.take_events();
            self.dispatcher.emit_all(events).await;
        }

        if notify_provider {
            if let Err(e) = self.telephony.set_held(id, on_hold).await {
                warn!("Holding call {} on the provider failed: {}", id, e);
            }
        }
        Ok(())
    }

    /// Apply an event-only action to a live call
    async fn record_on<F>(&self, id: CallId, op: &str, action: F) -> Result<()>
    where
        F: FnOnce(&mut Call) -> Result<()>,
    {
        let mut state = self.state.write().await;
        let call = logged(op, state.registry.require_mut(&id))?;
        logged(op, action(call))?;
        let events = call.take_events();
        self.dispatcher.emit_all(events).await;
        Ok(())
    }

    /// Time out a ringing call.
    ///
    /// From the ring timer, a call that was answered, started locally or is
    /// already gone is left alone. From the OS, those cases are errors.
    async fn expire(&self, id: CallId, from_timer: bool) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if from_timer {
                // Running on the timer task itself: detach, never abort
                state.timers.remove(&id);
            }

            let call = match state.registry.require_mut(&id) {
                Ok(call) => call,
                Err(e) if from_timer => {
                    debug!("Ring timer fired for call {} that is gone", id);
                    return Err(e);
                }
                Err(e) => return logged("time out", Err(e)),
            };

            let eligible = call.state() == CallState::Ringing
                && !call.is_accepted()
                && call.direction() == CallDirection::Incoming;
            if !eligible && from_timer {
                debug!("Ring timer fired for call {} in state {}", id, call.state().name());
                return Ok(());
            }

            logged("time out", call.time_out())?;
            let events = call.take_events();
            state.cancel_timer(&id);
            self.dispatcher.emit_all(events).await;
        }
        info!("Call {} timed out", id);

        self.release(id, EndReason::Unanswered).await;
        Ok(())
    }

    async fn audio_session_activated(&self) {
        let connected: Vec<CallId> = {
            let mut state = self.state.write().await;
            let mut connected = Vec::new();
            for call in state.registry.iter_mut() {
                if call.state() == CallState::Connecting && call.connect().is_ok() {
                    connected.push(call.id());
                }
            }
            for id in &connected {
                self.dispatcher.discard_pending_incoming(*id).await;
            }
            self.dispatcher
                .emit(HostEvent::new(
                    EventName::AudioSessionToggle,
                    json!({ "isActivate": true }),
                ))
                .await;
            connected
        };

        for id in connected {
            info!("Call {} connected on audio activation", id);
            if let Err(e) = self.telephony.report_connected(id).await {
                warn!("Reporting call {} as connected failed: {}", id, e);
            }
        }
    }

    async fn audio_session_deactivated(&self) {
        let any_on_hold = {
            let state = self.state.read().await;
            let any = state.registry.iter().any(|call| call.is_on_hold());
            any
        };
        if any_on_hold {
            debug!("Audio session deactivated while a call is on hold");
            return;
        }

        self.end_all_calls().await;
        self.dispatcher
            .emit(HostEvent::new(
                EventName::AudioSessionToggle,
                json!({ "isActivate": false }),
            ))
            .await;
    }

    fn spawn_ring_timer(&self, id: CallId, after: Duration) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = coordinator.expire(id, true).await;
        })
    }

    /// Fire-and-forget POST telling the calling server the call was declined
    fn send_decline_callback(&self, id: CallId, callback: DeclineCallback) {
        let Some(http) = self.http.clone() else {
            debug!("No HTTP client, skipping decline callback of call {}", id);
            return;
        };
        tokio::spawn(async move {
            match http.post_json(&callback.url, callback.body).await {
                Ok(()) => info!("Decline callback of call {} sent", id),
                Err(e) => warn!("Decline callback of call {} failed: {}", id, e),
            }
        });
    }

    /// Release native resources for a terminated call, then drop it from the registry
    async fn release(&self, id: CallId, reason: EndReason) {
        if let Err(e) = self.telephony.release(id, reason).await {
            warn!("Releasing native session of call {} failed: {}", id, e);
        }
        if let Some(signaling) = &self.signaling {
            signaling.close().await;
        }

        let mut state = self.state.write().await;
        match state.registry.remove_terminated(&id) {
            Ok(_) => debug!("Call {} removed from registry", id),
            Err(e) => warn!("Removing call {} failed: {}", id, e),
        }
        state.record_gauge();
    }
}

/// Log a failed operation at a level matching its severity
fn logged<T>(op: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        match e {
            DomainError::UnknownCall(_) | DomainError::AlreadyExists(_) => {
                debug!("{} ignored: {}", op, e)
            }
            _ => warn!("{} failed: {}", op, e),
        }
    }
    result
}
