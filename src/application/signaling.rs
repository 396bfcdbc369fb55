//! Signaling Bridge
//!
//! Thin adapter over a single platform peer connection. Creating a peer with a
//! new ICE configuration always closes the previous one first, so at most one
//! connection is ever live. Peer callbacks are forwarded to the host as
//! `ice-candidate`, `connection-state-change` and `data-received` events.

use crate::application::dispatcher::EventDispatcher;
use crate::domain::call::event::{EventName, HostEvent};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::signaling::{
    IceCandidate, IceServer, PeerConnection, PeerConnectionFactory, PeerEvent, SdpType,
    SessionDescription,
};
use base64::Engine;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Neutral outcomes reported back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingStatus {
    PeerCreated,
    SdpAdded,
    CandidateAdded,
    /// No peer connection exists; nothing was done
    NoPeerConnection,
    Closed,
}

impl SignalingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalingStatus::PeerCreated => "peer created",
            SignalingStatus::SdpAdded => "Sdp added",
            SignalingStatus::CandidateAdded => "ICE Candidate added",
            SignalingStatus::NoPeerConnection => "no peerConnection",
            SignalingStatus::Closed => "closed",
        }
    }
}

struct ActivePeer {
    connection: Arc<dyn PeerConnection>,
    generation: u64,
    pump: JoinHandle<()>,
}

#[derive(Default)]
struct BridgeState {
    peer: Option<ActivePeer>,
    generation: u64,
}

#[derive(Clone)]
pub struct SignalingBridge {
    factory: Arc<dyn PeerConnectionFactory>,
    dispatcher: EventDispatcher,
    default_ice_servers: Vec<IceServer>,
    state: Arc<Mutex<BridgeState>>,
}

impl SignalingBridge {
    pub fn new(
        factory: Arc<dyn PeerConnectionFactory>,
        dispatcher: EventDispatcher,
        default_ice_servers: Vec<IceServer>,
    ) -> Self {
        Self {
            factory,
            dispatcher,
            default_ice_servers,
            state: Arc::new(Mutex::new(BridgeState::default())),
        }
    }

    /// Create the peer connection.
    ///
    /// With `ice_servers` any existing connection is replaced. Without, an
    /// existing connection is kept and a missing one is built from the
    /// configured default servers.
    pub async fn create_peer(&self, ice_servers: Option<Vec<IceServer>>) -> Result<SignalingStatus> {
        match ice_servers {
            Some(servers) => self.replace_peer(servers).await?,
            None => {
                if !self.has_peer().await {
                    self.replace_peer(self.default_ice_servers.clone()).await?;
                }
            }
        }
        Ok(SignalingStatus::PeerCreated)
    }

    /// Create an SDP offer, replacing the peer first when servers are given
    pub async fn create_offer(
        &self,
        ice_servers: Option<Vec<IceServer>>,
    ) -> Result<SessionDescription> {
        if let Some(servers) = ice_servers {
            self.replace_peer(servers).await?;
        }
        let peer = self.require_peer().await?;
        peer.create_offer().await.map_err(|e| {
            error!("Failed to create offer: {}", e);
            e
        })
    }

    pub async fn create_answer(&self) -> Result<SessionDescription> {
        let peer = self.require_peer().await?;
        peer.create_answer().await.map_err(|e| {
            error!("Failed to create answer: {}", e);
            e
        })
    }

    /// Apply the remote description.
    ///
    /// Rejected when the connection is already closed or failed.
    pub async fn set_remote_sdp(
        &self,
        sdp: String,
        sdp_type: SdpType,
        ice_servers: Option<Vec<IceServer>>,
    ) -> Result<SignalingStatus> {
        if let Some(servers) = ice_servers {
            self.replace_peer(servers).await?;
        }
        let Some(peer) = self.current_peer().await else {
            warn!("Remote SDP received without a peer connection");
            return Ok(SignalingStatus::NoPeerConnection);
        };

        let state = peer.state();
        if state.is_terminal() {
            warn!("Ignoring remote SDP, peer connection is {}", state);
            return Err(DomainError::Signaling(format!(
                "Peer connection is {}",
                state
            )));
        }

        let description = SessionDescription::new(sdp_type, sdp);
        peer.set_remote_description(&description).await.map_err(|e| {
            error!("Failed to set remote {}: {}", sdp_type.as_str(), e);
            e
        })?;
        debug!("Remote {} applied", sdp_type.as_str());
        Ok(SignalingStatus::SdpAdded)
    }

    pub async fn set_remote_ice_candidate(
        &self,
        candidate: IceCandidate,
    ) -> Result<SignalingStatus> {
        let Some(peer) = self.current_peer().await else {
            debug!("ICE candidate received without a peer connection");
            return Ok(SignalingStatus::NoPeerConnection);
        };

        peer.add_ice_candidate(&candidate).await.map_err(|e| {
            warn!("Failed to add ICE candidate: {}", e);
            e
        })?;
        Ok(SignalingStatus::CandidateAdded)
    }

    pub async fn peer_connection_status(&self) -> &'static str {
        if self.has_peer().await {
            "active"
        } else {
            "not initialized"
        }
    }

    pub async fn remote_description_status(&self) -> &'static str {
        match self.current_peer().await {
            Some(peer) if peer.has_remote_description().await => "available",
            _ => "unavailable",
        }
    }

    /// Close and forget the current connection, if any
    pub async fn close(&self) -> SignalingStatus {
        let mut state = self.state.lock().await;
        if let Some(active) = state.peer.take() {
            active.pump.abort();
            Self::shutdown(active.connection, active.generation).await;
        }
        SignalingStatus::Closed
    }

    pub async fn has_peer(&self) -> bool {
        self.state.lock().await.peer.is_some()
    }

    async fn current_peer(&self) -> Option<Arc<dyn PeerConnection>> {
        let state = self.state.lock().await;
        state.peer.as_ref().map(|active| active.connection.clone())
    }

    async fn require_peer(&self) -> Result<Arc<dyn PeerConnection>> {
        self.current_peer()
            .await
            .ok_or_else(|| DomainError::Signaling("WebRTC manager not initialized".to_string()))
    }

    /// Close any existing connection, then create a new one
    async fn replace_peer(&self, ice_servers: Vec<IceServer>) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Some(previous) = state.peer.take() {
            previous.pump.abort();
            Self::shutdown(previous.connection, previous.generation).await;
        }

        state.generation += 1;
        let generation = state.generation;

        let (tx, rx) = mpsc::unbounded_channel();
        let connection = self.factory.create(&ice_servers, tx).await.map_err(|e| {
            error!("Failed to create peer connection: {}", e);
            e
        })?;

        let pump = tokio::spawn(self.clone().pump_events(rx, generation));
        state.peer = Some(ActivePeer {
            connection,
            generation,
            pump,
        });

        info!(
            "Peer connection {} created with {} ICE servers",
            generation,
            ice_servers.len()
        );
        Ok(())
    }

    async fn shutdown(connection: Arc<dyn PeerConnection>, generation: u64) {
        if let Err(e) = connection.close().await {
            warn!("Closing peer connection {} failed: {}", generation, e);
        } else {
            info!("Peer connection {} closed", generation);
        }
    }

    /// Forward peer callbacks until the connection drops its sender
    async fn pump_events(self, mut rx: mpsc::UnboundedReceiver<PeerEvent>, generation: u64) {
        while let Some(event) = rx.recv().await {
            match event {
                PeerEvent::LocalCandidate(candidate) => {
                    self.dispatcher
                        .emit(HostEvent::new(
                            EventName::IceCandidate,
                            json!({ "iceCandidate": candidate }),
                        ))
                        .await;
                }
                PeerEvent::StateChanged(connection_state) => {
                    debug!("Peer connection {} is {}", generation, connection_state);
                    self.dispatcher
                        .emit(HostEvent::new(
                            EventName::ConnectionStateChange,
                            json!({ "connectionState": connection_state.as_str() }),
                        ))
                        .await;
                    if connection_state.requires_close() {
                        self.close_generation(generation).await;
                    }
                }
                PeerEvent::DataReceived(bytes) => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                    self.dispatcher
                        .emit(HostEvent::new(
                            EventName::DataReceived,
                            json!({ "dataReceived": encoded }),
                        ))
                        .await;
                }
            }
        }
    }

    /// Self-close after failure, unless the connection was already replaced.
    ///
    /// Runs on the pump task, so the pump handle is detached rather than aborted.
    async fn close_generation(&self, generation: u64) {
        let mut state = self.state.lock().await;
        let is_current = state
            .peer
            .as_ref()
            .is_some_and(|active| active.generation == generation);
        if !is_current {
            return;
        }
        if let Some(active) = state.peer.take() {
            warn!("Peer connection {} failed, closing", generation);
            Self::shutdown(active.connection, generation).await;
        }
    }
}
