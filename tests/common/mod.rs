//! Recording fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use callkit_bridge::application::{CallCoordinator, EventDispatcher, SignalingBridge};
use callkit_bridge::config::CoordinatorConfig;
use callkit_bridge::domain::call::{CallData, EndReason, EventName, HostEvent};
use callkit_bridge::domain::callback::HttpClient;
use callkit_bridge::domain::host::HostBridge;
use callkit_bridge::domain::shared::value_objects::CallId;
use callkit_bridge::domain::signaling::{
    IceCandidate, IceServer, PeerConnection, PeerConnectionFactory, PeerConnectionState,
    PeerEventSender, SdpType, SessionDescription,
};
use callkit_bridge::domain::telephony::TelephonyProvider;
use callkit_bridge::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Host bridge that keeps every delivered event
#[derive(Default)]
pub struct RecordingBridge {
    events: Mutex<Vec<HostEvent>>,
    dead: AtomicBool,
}

impl RecordingBridge {
    pub fn names(&self) -> Vec<EventName> {
        self.events.lock().unwrap().iter().map(|e| e.name).collect()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, name: EventName) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }

    pub fn kill(&self) {
        self.dead.store(true, Ordering::SeqCst);
    }
}

impl HostBridge for RecordingBridge {
    fn is_alive(&self) -> bool {
        !self.dead.load(Ordering::SeqCst)
    }

    fn deliver(&self, event: &HostEvent) -> std::result::Result<(), String> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Telephony provider that records reports and releases
#[derive(Default)]
pub struct RecordingTelephony {
    incoming_reports: AtomicUsize,
    releases: Mutex<Vec<(CallId, EndReason)>>,
}

impl RecordingTelephony {
    pub fn incoming_reports(&self) -> usize {
        self.incoming_reports.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> Vec<(CallId, EndReason)> {
        self.releases.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelephonyProvider for RecordingTelephony {
    async fn report_incoming(&self, _call: &CallData) -> Result<()> {
        self.incoming_reports.fetch_add(1, Ordering::SeqCst);
        // The OS answers asynchronously
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn report_outgoing(&self, _call: &CallData) -> Result<()> {
        Ok(())
    }

    async fn report_connected(&self, _id: CallId) -> Result<()> {
        Ok(())
    }

    async fn set_muted(&self, _id: CallId, _muted: bool) -> Result<()> {
        Ok(())
    }

    async fn set_held(&self, _id: CallId, _on_hold: bool) -> Result<()> {
        Ok(())
    }

    async fn release(&self, id: CallId, reason: EndReason) -> Result<()> {
        self.releases.lock().unwrap().push((id, reason));
        Ok(())
    }
}

/// HTTP client that records every POST
#[derive(Default)]
pub struct RecordingHttp {
    posts: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingHttp {
    pub fn posts(&self) -> Vec<(String, Option<String>)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for RecordingHttp {
    async fn post_json(&self, url: &str, body: Option<String>) -> Result<()> {
        self.posts.lock().unwrap().push((url.to_string(), body));
        Ok(())
    }
}

/// Peer connection that tracks how many instances are still open
pub struct FakePeer {
    live: Arc<AtomicUsize>,
    closed: AtomicBool,
    state: Mutex<PeerConnectionState>,
    remote: Mutex<Option<SessionDescription>>,
    candidates: Mutex<Vec<IceCandidate>>,
}

impl FakePeer {
    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn create_offer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::new(SdpType::Offer, "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n"))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::new(SdpType::Answer, "v=0\r\no=- 2 1 IN IP4 0.0.0.0\r\n"))
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()> {
        *self.remote.lock().unwrap() = Some(description.clone());
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        self.candidates.lock().unwrap().push(candidate.clone());
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.remote.lock().unwrap().is_some()
    }

    fn state(&self) -> PeerConnectionState {
        *self.state.lock().unwrap()
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        *self.state.lock().unwrap() = PeerConnectionState::Closed;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePeerFactory {
    pub created: AtomicUsize,
    pub live: Arc<AtomicUsize>,
    senders: Mutex<Vec<PeerEventSender>>,
    peers: Mutex<Vec<Arc<FakePeer>>>,
}

impl FakePeerFactory {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Event sender of the most recently created peer
    pub fn last_sender(&self) -> PeerEventSender {
        self.senders.lock().unwrap().last().cloned().unwrap()
    }

    pub fn last_peer(&self) -> Arc<FakePeer> {
        self.peers.lock().unwrap().last().cloned().unwrap()
    }

    pub fn set_last_state(&self, state: PeerConnectionState) {
        *self.last_peer().state.lock().unwrap() = state;
    }
}

#[async_trait]
impl PeerConnectionFactory for FakePeerFactory {
    async fn create(
        &self,
        _ice_servers: &[IceServer],
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerConnection>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        let peer = Arc::new(FakePeer {
            live: self.live.clone(),
            closed: AtomicBool::new(false),
            state: Mutex::new(PeerConnectionState::New),
            remote: Mutex::new(None),
            candidates: Mutex::new(Vec::new()),
        });
        self.senders.lock().unwrap().push(events);
        self.peers.lock().unwrap().push(peer.clone());
        Ok(peer)
    }
}

pub struct Harness {
    pub coordinator: CallCoordinator,
    pub dispatcher: EventDispatcher,
    pub telephony: Arc<RecordingTelephony>,
    pub bridge: Arc<RecordingBridge>,
}

/// Coordinator with a live recording bridge attached
pub async fn attached_harness() -> Harness {
    let harness = detached_harness();
    harness.dispatcher.attach(harness.bridge.clone()).await;
    harness
}

/// Coordinator whose host has not attached yet
pub fn detached_harness() -> Harness {
    let dispatcher = EventDispatcher::new();
    let telephony = Arc::new(RecordingTelephony::default());
    let coordinator = CallCoordinator::new(
        CoordinatorConfig::default(),
        dispatcher.clone(),
        telephony.clone(),
    );
    Harness {
        coordinator,
        dispatcher,
        telephony,
        bridge: Arc::new(RecordingBridge::default()),
    }
}

pub fn signaling(factory: Arc<FakePeerFactory>, dispatcher: EventDispatcher) -> SignalingBridge {
    SignalingBridge::new(factory, dispatcher, vec![IceServer::new("stun:stun.example.com")])
}

/// Let spawned tasks run until `done` holds or the budget runs out
pub async fn settle<F>(mut done: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
}
