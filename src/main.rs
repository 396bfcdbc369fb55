use callkit_bridge::application::{CallCoordinator, EventDispatcher, PushService, SignalingBridge};
use callkit_bridge::config::Config;
use callkit_bridge::domain::push::SettingsStore;
use callkit_bridge::domain::shared::value_objects::CallId;
use callkit_bridge::domain::telephony::NativeAction;
use callkit_bridge::infrastructure::http::ReqwestHttpClient;
use callkit_bridge::infrastructure::persistence::{JsonFileSettingsStore, MemorySettingsStore};
use callkit_bridge::infrastructure::telephony::HeadlessTelephonyProvider;
use callkit_bridge::interface::plugin::{ChannelHostBridge, PluginHandler};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "native-webrtc")]
use callkit_bridge::infrastructure::protocols::webrtc::NativePeerConnectionFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting callkit-bridge");
    info!("Configuration loaded: {:?}", config);

    let dispatcher = EventDispatcher::new();
    let telephony = Arc::new(HeadlessTelephonyProvider::new());
    let signaling = signaling_bridge(&config, dispatcher.clone());

    let http = Arc::new(ReqwestHttpClient::new(config.callback.timeout())?);

    let mut coordinator =
        CallCoordinator::new(config.coordinator.clone(), dispatcher.clone(), telephony)
            .with_http_client(http);
    if let Some(signaling) = &signaling {
        coordinator = coordinator.with_signaling(signaling.clone());
    }

    let settings: Arc<dyn SettingsStore> = match &config.push.settings_path {
        Some(path) => Arc::new(JsonFileSettingsStore::new(path)),
        None => Arc::new(MemorySettingsStore::new()),
    };
    let mut push = PushService::new(coordinator.clone(), settings, config.push.token_error_policy);
    if let Some(signaling) = &signaling {
        push = push.with_signaling(signaling.clone());
    }

    let handler = PluginHandler::new(coordinator, push, signaling);

    // Demo: drive a call through the plugin the way a host app would
    demo_call_lifecycle(&handler, &dispatcher).await?;

    info!("callkit-bridge demo finished");
    Ok(())
}

#[cfg(feature = "native-webrtc")]
fn signaling_bridge(config: &Config, dispatcher: EventDispatcher) -> Option<SignalingBridge> {
    Some(SignalingBridge::new(
        Arc::new(NativePeerConnectionFactory),
        dispatcher,
        config.signaling.ice_servers.clone(),
    ))
}

#[cfg(not(feature = "native-webrtc"))]
fn signaling_bridge(_config: &Config, _dispatcher: EventDispatcher) -> Option<SignalingBridge> {
    None
}

/// Call lifecycle demo
async fn demo_call_lifecycle(
    handler: &PluginHandler,
    dispatcher: &EventDispatcher,
) -> anyhow::Result<()> {
    info!("=== Call Lifecycle Demo ===");

    // The app is not running yet: the push and the answer are buffered
    handler.push().set_push_token("demo-voip-token").await?;

    let id = CallId::new();
    let mut payload = Map::new();
    payload.insert(
        "call".to_string(),
        Value::String(
            json!({
                "id": id.to_string(),
                "nameCaller": "Alice",
                "handle": "0123456789",
                "duration": 30000
            })
            .to_string(),
        ),
    );
    handler.push().handle_push_payload(&payload).await?;
    handler
        .coordinator()
        .handle_native_action(NativeAction::Answer(id))
        .await?;
    info!("Pending events: {:?}", dispatcher.pending().await);

    // The host starts and attaches its bridge
    let bridge = Arc::new(ChannelHostBridge::default());
    let mut rx = bridge.subscribe();
    let listener = tokio::spawn(async move {
        while let Ok(envelope) = rx.recv().await {
            info!("Host received {}: {}", envelope.event, envelope.body);
        }
    });
    dispatcher.attach(bridge.clone()).await;

    let response = handler.do_method("sendPendingAcceptEvent", Value::Null).await;
    info!("Pending accept payload: {:?}", response.data);

    handler
        .coordinator()
        .handle_native_action(NativeAction::AudioSessionActivated)
        .await?;

    let call = json!({ "id": id.to_string() });
    handler
        .do_method("muteCall", json!({ "id": id.to_string(), "isMuted": true }))
        .await;
    handler
        .do_method("holdCall", json!({ "id": id.to_string(), "isOnHold": true }))
        .await;
    handler
        .do_method("holdCall", json!({ "id": id.to_string(), "isOnHold": false }))
        .await;

    let active = handler.do_method("activeCalls", Value::Null).await;
    info!("Active calls: {:?}", active.data);

    handler.do_method("endCall", call).await;

    // A second call that is started locally, then swept up
    let outgoing = CallId::new();
    handler
        .do_method(
            "startCall",
            json!({ "id": outgoing.to_string(), "nameCaller": "Bob", "handle": "100" }),
        )
        .await;
    handler.do_method("endAllCalls", Value::Null).await;

    let status = handler.do_method("getPeerConnectionStatus", Value::Null).await;
    info!("Peer connection: {:?}", status.data);

    // Let the listener drain before the host goes away
    tokio::time::sleep(Duration::from_millis(50)).await;
    bridge.shutdown();
    dispatcher.detach().await;
    listener.abort();

    Ok(())
}
