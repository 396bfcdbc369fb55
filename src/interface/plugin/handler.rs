//! Plugin method dispatch
//!
//! Every host method call ends in a [`PluginResponse`]. Unknown calls, invalid
//! transitions, duplicates and malformed options resolve neutrally; signaling
//! and internal failures reject with their message.

use super::dto::{
    parse_options, CallIdOptions, CandidateOptions, IceServerOptions, PluginResponse,
    RemoteSdpOptions,
};
use crate::application::coordinator::CallCoordinator;
use crate::application::push::PushService;
use crate::application::signaling::SignalingBridge;
use crate::domain::call::entity::CallData;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::signaling::SdpType;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct PluginHandler {
    coordinator: CallCoordinator,
    push: PushService,
    signaling: Option<SignalingBridge>,
}

impl PluginHandler {
    pub fn new(
        coordinator: CallCoordinator,
        push: PushService,
        signaling: Option<SignalingBridge>,
    ) -> Self {
        Self {
            coordinator,
            push,
            signaling,
        }
    }

    pub fn coordinator(&self) -> &CallCoordinator {
        &self.coordinator
    }

    pub fn push(&self) -> &PushService {
        &self.push
    }

    /// Run a host method and convert its outcome
    pub async fn do_method(&self, method: &str, options: Value) -> PluginResponse {
        debug!("Plugin method {}", method);
        match self.dispatch(method, options).await {
            Ok(Some(data)) => PluginResponse::resolve(data),
            Ok(None) => PluginResponse::neutral(),
            Err(e) if e.is_neutral() => {
                info!("{} resolved neutrally: {}", method, e);
                PluginResponse::neutral()
            }
            Err(e) => {
                warn!("{} rejected: {}", method, e);
                PluginResponse::reject(e.to_string())
            }
        }
    }

    async fn dispatch(&self, method: &str, options: Value) -> Result<Option<Value>> {
        match method {
            "showCallkitIncoming" => {
                let data = CallData::from_value(options)?;
                self.coordinator.show_incoming(data).await?;
                Ok(None)
            }
            "startCall" => {
                let data = CallData::from_value(options)?;
                self.coordinator.start_call(data).await?;
                Ok(None)
            }
            "endCall" => {
                let options: CallIdOptions = parse_options(options)?;
                self.coordinator.end_call(options.id).await?;
                Ok(None)
            }
            "muteCall" => {
                let options: CallIdOptions = parse_options(options)?;
                let Some(muted) = options.is_muted else {
                    debug!("muteCall without isMuted, nothing to do");
                    return Ok(None);
                };
                self.coordinator.mute_call(options.id, muted).await?;
                Ok(None)
            }
            "holdCall" => {
                let options: CallIdOptions = parse_options(options)?;
                let Some(on_hold) = options.is_on_hold else {
                    debug!("holdCall without isOnHold, nothing to do");
                    return Ok(None);
                };
                self.coordinator.hold_call(options.id, on_hold).await?;
                Ok(None)
            }
            "isMuted" => {
                let options: CallIdOptions = parse_options(options)?;
                Ok(Some(json!(self.coordinator.is_muted(options.id).await)))
            }
            "callConnected" => {
                let options: CallIdOptions = parse_options(options)?;
                self.coordinator.connected_call(options.id).await?;
                Ok(None)
            }
            "activeCalls" => {
                let calls: Vec<Value> = self
                    .coordinator
                    .active_calls()
                    .await
                    .iter()
                    .map(|call| call.to_payload())
                    .collect();
                Ok(Some(Value::Array(calls)))
            }
            "endAllCalls" => {
                self.coordinator.end_all_calls().await;
                Ok(None)
            }
            "getDevicePushTokenVoIP" => Ok(Some(json!(self.push.push_token().await?))),
            "silenceEvents" => {
                let silence = options.as_bool().unwrap_or(false);
                self.coordinator.dispatcher().set_silenced(silence).await;
                Ok(None)
            }
            "sendPendingAcceptEvent" => Ok(self.coordinator.send_pending_events().await),
            "sendCustomEvent" => {
                self.coordinator.send_custom(options).await;
                Ok(None)
            }

            "createPeer" => {
                let options = ice_options(options)?;
                let status = self.signaling()?.create_peer(options.servers()?).await?;
                Ok(Some(json!(status.as_str())))
            }
            "createOffer" => {
                let options = ice_options(options)?;
                let offer = self.signaling()?.create_offer(options.servers()?).await?;
                Ok(Some(json!(offer)))
            }
            "createAnswer" => {
                let answer = self.signaling()?.create_answer().await?;
                Ok(Some(json!(answer)))
            }
            "setRemoteSdp" => {
                let options: RemoteSdpOptions = parse_options(options)?;
                let sdp_type = SdpType::parse(&options.sdp_type)?;
                let servers = options.ice.servers()?;
                let status = self
                    .signaling()?
                    .set_remote_sdp(options.sdp, sdp_type, servers)
                    .await?;
                Ok(Some(json!(status.as_str())))
            }
            "setRemoteIceCandidate" => {
                let options: CandidateOptions = parse_options(options).map_err(|_| {
                    DomainError::Signaling("Missing ICE candidate parameters".to_string())
                })?;
                let status = self
                    .signaling()?
                    .set_remote_ice_candidate(options.into())
                    .await?;
                Ok(Some(json!(status.as_str())))
            }
            "getPeerConnectionStatus" => {
                let status = match &self.signaling {
                    Some(signaling) => signaling.peer_connection_status().await,
                    None => "not initialized",
                };
                Ok(Some(json!(status)))
            }
            "getRemoteDescriptionStatus" => {
                let status = match &self.signaling {
                    Some(signaling) => signaling.remote_description_status().await,
                    None => "unavailable",
                };
                Ok(Some(json!(status)))
            }
            "closePeerConnection" => {
                let status = match &self.signaling {
                    Some(signaling) => signaling.close().await.as_str(),
                    None => "closed",
                };
                Ok(Some(json!(status)))
            }

            other => {
                warn!("Unknown plugin method {}", other);
                Ok(None)
            }
        }
    }

    fn signaling(&self) -> Result<&SignalingBridge> {
        self.signaling
            .as_ref()
            .ok_or_else(|| DomainError::Signaling("WebRTC manager not initialized".to_string()))
    }
}

/// ICE options may be omitted entirely
fn ice_options(options: Value) -> Result<IceServerOptions> {
    if options.is_null() {
        return Ok(IceServerOptions::default());
    }
    parse_options(options)
}
