//! Broadcast-channel host bridge
//!
//! Host listeners subscribe to receive [`EventEnvelope`]s. The bridge counts
//! as live until it is shut down, and only while someone is listening.

use super::dto::EventEnvelope;
use crate::domain::call::event::HostEvent;
use crate::domain::host::HostBridge;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

pub struct ChannelHostBridge {
    tx: broadcast::Sender<EventEnvelope>,
    alive: AtomicBool,
}

impl ChannelHostBridge {
    /// Create new bridge with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            alive: AtomicBool::new(true),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// The hosting process went away
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        info!("Host bridge shut down");
    }
}

impl Default for ChannelHostBridge {
    fn default() -> Self {
        Self::new(256)
    }
}

impl HostBridge for ChannelHostBridge {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && self.tx.receiver_count() > 0
    }

    fn deliver(&self, event: &HostEvent) -> Result<(), String> {
        let receivers = self
            .tx
            .send(EventEnvelope::from(event))
            .map_err(|e| format!("No host listener: {}", e))?;
        debug!("Event {} sent to {} listeners", event.name, receivers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::event::EventName;
    use serde_json::json;

    #[test]
    fn test_liveness_requires_listener() {
        let bridge = ChannelHostBridge::default();
        assert!(!bridge.is_alive());

        let _rx = bridge.subscribe();
        assert!(bridge.is_alive());

        bridge.shutdown();
        assert!(!bridge.is_alive());
    }

    #[tokio::test]
    async fn test_delivery_envelope() {
        let bridge = ChannelHostBridge::new(8);
        let mut rx = bridge.subscribe();

        bridge
            .deliver(&HostEvent::new(EventName::Custom, json!({ "k": "v" })))
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event, "custom");
        assert_eq!(envelope.body, json!({ "k": "v" }));
    }
}
