//! Peer connection backed by the `webrtc` crate
//!
//! Each connection carries one audio transceiver and a `data` channel. Local
//! ICE candidates, state changes and inbound channel messages are forwarded
//! to the signaling bridge as [`PeerEvent`]s.

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::signaling::{
    IceCandidate, IceServer, PeerConnection, PeerConnectionFactory, PeerConnectionState,
    PeerEvent, PeerEventSender, SdpType, SessionDescription,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

fn signaling_error(context: &str, e: webrtc::Error) -> DomainError {
    DomainError::Signaling(format!("{}: {}", context, e))
}

fn map_state(state: RTCPeerConnectionState) -> PeerConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => PeerConnectionState::Connecting,
        RTCPeerConnectionState::Connected => PeerConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => PeerConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => PeerConnectionState::Failed,
        RTCPeerConnectionState::Closed => PeerConnectionState::Closed,
        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => {
            PeerConnectionState::New
        }
    }
}

fn to_rtc_ice_servers(servers: &[IceServer]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}

fn to_description(description: RTCSessionDescription) -> SessionDescription {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::PrAnswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        _ => SdpType::Offer,
    };
    SessionDescription::new(sdp_type, description.sdp)
}

/// Forward inbound data-channel messages
fn forward_messages(channel: &Arc<RTCDataChannel>, events: PeerEventSender) {
    let label = channel.label().to_string();
    channel.on_message(Box::new(move |message: DataChannelMessage| {
        let events = events.clone();
        let label = label.clone();
        Box::pin(async move {
            debug!("{} bytes on data channel {}", message.data.len(), label);
            let _ = events.send(PeerEvent::DataReceived(message.data.to_vec()));
        })
    }));
}

pub struct NativePeerConnection {
    connection: Arc<RTCPeerConnection>,
}

impl NativePeerConnection {
    async fn build(ice_servers: &[IceServer], events: PeerEventSender) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| signaling_error("Failed to register codecs", e))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| signaling_error("Failed to register interceptors", e))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: to_rtc_ice_servers(ice_servers),
            ..Default::default()
        };
        let connection = Arc::new(
            api.new_peer_connection(config)
                .await
                .map_err(|e| signaling_error("Failed to create peer connection", e))?,
        );

        connection
            .add_transceiver_from_kind(RTPCodecType::Audio, None)
            .await
            .map_err(|e| signaling_error("Failed to add audio transceiver", e))?;

        let local_channel = connection
            .create_data_channel("data", None)
            .await
            .map_err(|e| signaling_error("Failed to create data channel", e))?;
        forward_messages(&local_channel, events.clone());

        let candidate_events = events.clone();
        connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let events = candidate_events.clone();
            Box::pin(async move {
                // None marks the end of gathering
                let Some(candidate) = candidate else {
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = events.send(PeerEvent::LocalCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid.unwrap_or_default(),
                            sdp_m_line_index: init.sdp_mline_index.unwrap_or_default(),
                        }));
                    }
                    Err(e) => warn!("Failed to serialize local candidate: {}", e),
                }
            })
        }));

        let state_events = events.clone();
        connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    let _ = events.send(PeerEvent::StateChanged(map_state(state)));
                })
            },
        ));

        connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            let events = events.clone();
            Box::pin(async move {
                info!("Remote opened data channel {}", channel.label());
                forward_messages(&channel, events);
            })
        }));

        Ok(Self { connection })
    }

    async fn apply_local(&self, description: RTCSessionDescription) -> Result<SessionDescription> {
        self.connection
            .set_local_description(description.clone())
            .await
            .map_err(|e| signaling_error("Failed to set local description", e))?;
        Ok(to_description(description))
    }
}

#[async_trait]
impl PeerConnection for NativePeerConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .connection
            .create_offer(None)
            .await
            .map_err(|e| signaling_error("Failed to create offer", e))?;
        self.apply_local(offer).await
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .connection
            .create_answer(None)
            .await
            .map_err(|e| signaling_error("Failed to create answer", e))?;
        self.apply_local(answer).await
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()> {
        let sdp = description.sdp.clone();
        let remote = match description.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(sdp),
            SdpType::Answer => RTCSessionDescription::answer(sdp),
            SdpType::PrAnswer => RTCSessionDescription::pranswer(sdp),
            SdpType::Rollback => {
                return Err(DomainError::Signaling(
                    "Rollback descriptions are not supported".to_string(),
                ))
            }
        }
        .map_err(|e| signaling_error("Invalid remote description", e))?;

        self.connection
            .set_remote_description(remote)
            .await
            .map_err(|e| signaling_error("Failed to set remote description", e))
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: Some(candidate.sdp_mid.clone()),
            sdp_mline_index: Some(candidate.sdp_m_line_index),
            ..Default::default()
        };
        self.connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| signaling_error("Failed to add ICE candidate", e))
    }

    async fn has_remote_description(&self) -> bool {
        self.connection.remote_description().await.is_some()
    }

    fn state(&self) -> PeerConnectionState {
        map_state(self.connection.connection_state())
    }

    async fn close(&self) -> Result<()> {
        self.connection
            .close()
            .await
            .map_err(|e| signaling_error("Failed to close peer connection", e))
    }
}

/// Builds [`NativePeerConnection`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePeerConnectionFactory;

#[async_trait]
impl PeerConnectionFactory for NativePeerConnectionFactory {
    async fn create(
        &self,
        ice_servers: &[IceServer],
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerConnection>> {
        let connection = NativePeerConnection::build(ice_servers, events).await?;
        Ok(Arc::new(connection))
    }
}
