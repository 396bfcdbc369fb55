//! Event Dispatcher
//!
//! Delivers host events while a live bridge is attached. While detached, the
//! last incoming, accept and ended events are kept (one slot each, newest
//! wins); everything else is dropped.

use crate::domain::call::event::{HostEvent, PendingCategory};
use crate::domain::host::HostBridge;
use crate::domain::shared::value_objects::CallId;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of a single `emit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Kept as the pending event of its category
    Buffered,
    /// Host unavailable and the category is not buffered
    Dropped,
    /// Events are silenced
    Silenced,
}

/// One slot per buffered category
#[derive(Debug, Default, Clone)]
pub struct PendingEvents {
    incoming: Option<HostEvent>,
    accept: Option<HostEvent>,
    ended: Option<HostEvent>,
}

impl PendingEvents {
    fn slot(&mut self, category: PendingCategory) -> &mut Option<HostEvent> {
        match category {
            PendingCategory::Incoming => &mut self.incoming,
            PendingCategory::Accept => &mut self.accept,
            PendingCategory::Ended => &mut self.ended,
        }
    }

    pub fn get(&self, category: PendingCategory) -> Option<&HostEvent> {
        match category {
            PendingCategory::Incoming => self.incoming.as_ref(),
            PendingCategory::Accept => self.accept.as_ref(),
            PendingCategory::Ended => self.ended.as_ref(),
        }
    }

    /// Store `event`, replacing any previous event of the same category
    fn store(&mut self, category: PendingCategory, event: HostEvent) {
        *self.slot(category) = Some(event);
    }

    /// Remove and return all pending events in flush order
    fn drain(&mut self) -> Vec<HostEvent> {
        PendingCategory::FLUSH_ORDER
            .into_iter()
            .filter_map(|category| self.slot(category).take())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.incoming.is_none() && self.accept.is_none() && self.ended.is_none()
    }
}

struct DispatcherState {
    bridge: Option<Arc<dyn HostBridge>>,
    pending: PendingEvents,
    silenced: bool,
}

/// Translates internal events into host deliveries
#[derive(Clone)]
pub struct EventDispatcher {
    state: Arc<Mutex<DispatcherState>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DispatcherState {
                bridge: None,
                pending: PendingEvents::default(),
                silenced: false,
            })),
        }
    }

    /// The host runtime reports that its bridge is ready
    pub async fn attach(&self, bridge: Arc<dyn HostBridge>) {
        let mut state = self.state.lock().await;
        state.bridge = Some(bridge);
        info!("Host bridge attached");
    }

    /// The host runtime reports that its bridge went away
    pub async fn detach(&self) {
        let mut state = self.state.lock().await;
        if state.bridge.take().is_some() {
            info!("Host bridge detached");
        }
    }

    pub async fn is_attached(&self) -> bool {
        let state = self.state.lock().await;
        state.bridge.as_ref().is_some_and(|bridge| bridge.is_alive())
    }

    pub async fn set_silenced(&self, silenced: bool) {
        let mut state = self.state.lock().await;
        state.silenced = silenced;
        info!("Host events {}", if silenced { "silenced" } else { "unsilenced" });
    }

    pub async fn emit(&self, event: HostEvent) -> Delivery {
        let mut state = self.state.lock().await;
        Self::emit_locked(&mut state, event)
    }

    /// Emit several events in order
    pub async fn emit_all(&self, events: Vec<HostEvent>) {
        if events.is_empty() {
            return;
        }
        let mut state = self.state.lock().await;
        for event in events {
            Self::emit_locked(&mut state, event);
        }
    }

    fn emit_locked(state: &mut DispatcherState, event: HostEvent) -> Delivery {
        if state.silenced {
            debug!("Event {} silenced", event.name);
            metrics::counter!("callkit_events_dropped_total", "reason" => "silenced").increment(1);
            return Delivery::Silenced;
        }

        if let Some(bridge) = state.bridge.as_ref().filter(|bridge| bridge.is_alive()) {
            match bridge.deliver(&event) {
                Ok(()) => {
                    debug!("Delivered event {}", event.name);
                    metrics::counter!("callkit_events_delivered_total", "event" => event.name.as_str())
                        .increment(1);
                    return Delivery::Delivered;
                }
                Err(e) => warn!("Delivery of event {} failed: {}", event.name, e),
            }
        }

        match event.name.pending_category() {
            Some(category) => {
                debug!("Host unavailable, keeping {} as pending", event.name);
                metrics::counter!("callkit_events_buffered_total", "event" => event.name.as_str())
                    .increment(1);
                state.pending.store(category, event);
                Delivery::Buffered
            }
            None => {
                debug!("Host unavailable, dropping event {}", event.name);
                metrics::counter!("callkit_events_dropped_total", "reason" => "detached")
                    .increment(1);
                Delivery::Dropped
            }
        }
    }

    /// Deliver pending events in order incoming, accept, ended.
    ///
    /// Returns the events taken from the buffer. Any that still cannot be
    /// delivered go back into their slot.
    pub async fn flush_pending(&self) -> Vec<HostEvent> {
        let mut state = self.state.lock().await;
        let pending = state.pending.drain();
        if !pending.is_empty() {
            info!("Flushing {} pending events", pending.len());
        }
        for event in &pending {
            Self::emit_locked(&mut state, event.clone());
        }
        pending
    }

    /// Drop a buffered `incoming` that belongs to `call_id`.
    ///
    /// A call that got past ringing must not be announced as incoming again
    /// on the next flush.
    pub async fn discard_pending_incoming(&self, call_id: CallId) -> bool {
        let mut state = self.state.lock().await;
        let slot = state.pending.slot(PendingCategory::Incoming);
        if slot.as_ref().and_then(|event| event.call_id) != Some(call_id) {
            return false;
        }
        *slot = None;
        debug!("Discarded pending incoming of call {}", call_id);
        true
    }

    /// Snapshot of the pending slots
    pub async fn pending(&self) -> PendingEvents {
        self.state.lock().await.pending.clone()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::event::EventName;
    use crate::domain::host::MockHostBridge;
    use serde_json::json;

    fn event(name: EventName, tag: &str) -> HostEvent {
        HostEvent::for_call(name, CallId::new(), json!({ "tag": tag }))
    }

    #[tokio::test]
    async fn test_detached_buffers_only_three_categories() {
        let dispatcher = EventDispatcher::new();

        assert_eq!(dispatcher.emit(event(EventName::Incoming, "a")).await, Delivery::Buffered);
        assert_eq!(dispatcher.emit(event(EventName::MuteToggle, "b")).await, Delivery::Dropped);
        assert_eq!(dispatcher.emit(event(EventName::Timeout, "c")).await, Delivery::Dropped);

        let pending = dispatcher.pending().await;
        assert!(pending.get(PendingCategory::Incoming).is_some());
        assert!(pending.get(PendingCategory::Accept).is_none());
    }

    #[tokio::test]
    async fn test_newer_event_overwrites_slot() {
        let dispatcher = EventDispatcher::new();
        dispatcher.emit(event(EventName::Accept, "first")).await;
        dispatcher.emit(event(EventName::Accept, "second")).await;

        let pending = dispatcher.pending().await;
        let accept = pending.get(PendingCategory::Accept).unwrap();
        assert_eq!(accept.payload["tag"], "second");
    }

    #[tokio::test]
    async fn test_flush_order() {
        let dispatcher = EventDispatcher::new();
        dispatcher.emit(event(EventName::Ended, "e")).await;
        dispatcher.emit(event(EventName::Accept, "a")).await;
        dispatcher.emit(event(EventName::Incoming, "i")).await;

        let mut bridge = MockHostBridge::new();
        bridge.expect_is_alive().return_const(true);
        let mut seq = mockall::Sequence::new();
        for expected in [EventName::Incoming, EventName::Accept, EventName::Ended] {
            bridge
                .expect_deliver()
                .withf(move |e| e.name == expected)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }
        dispatcher.attach(Arc::new(bridge)).await;

        let flushed = dispatcher.flush_pending().await;
        assert_eq!(flushed.len(), 3);
        assert!(dispatcher.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_bridge_is_not_used() {
        let mut bridge = MockHostBridge::new();
        bridge.expect_is_alive().return_const(false);
        bridge.expect_deliver().never();

        let dispatcher = EventDispatcher::new();
        dispatcher.attach(Arc::new(bridge)).await;

        assert!(!dispatcher.is_attached().await);
        assert_eq!(dispatcher.emit(event(EventName::Incoming, "x")).await, Delivery::Buffered);
    }

    #[tokio::test]
    async fn test_failed_delivery_falls_back_to_buffer() {
        let mut bridge = MockHostBridge::new();
        bridge.expect_is_alive().return_const(true);
        bridge
            .expect_deliver()
            .returning(|_| Err("webview gone".to_string()));

        let dispatcher = EventDispatcher::new();
        dispatcher.attach(Arc::new(bridge)).await;

        assert_eq!(dispatcher.emit(event(EventName::Ended, "x")).await, Delivery::Buffered);
        assert_eq!(dispatcher.emit(event(EventName::Custom, "y")).await, Delivery::Dropped);
    }

    #[tokio::test]
    async fn test_discard_pending_incoming_matches_call() {
        let dispatcher = EventDispatcher::new();
        let id = CallId::new();
        dispatcher
            .emit(HostEvent::for_call(EventName::Incoming, id, json!({})))
            .await;
        dispatcher
            .emit(HostEvent::for_call(EventName::Accept, id, json!({})))
            .await;

        assert!(!dispatcher.discard_pending_incoming(CallId::new()).await);
        assert!(dispatcher.discard_pending_incoming(id).await);

        let pending = dispatcher.pending().await;
        assert!(pending.get(PendingCategory::Incoming).is_none());
        assert!(pending.get(PendingCategory::Accept).is_some());
    }

    #[tokio::test]
    async fn test_silenced_drops_everything() {
        let dispatcher = EventDispatcher::new();
        dispatcher.set_silenced(true).await;

        assert_eq!(dispatcher.emit(event(EventName::Incoming, "x")).await, Delivery::Silenced);
        assert!(dispatcher.pending().await.is_empty());

        dispatcher.set_silenced(false).await;
        assert_eq!(dispatcher.emit(event(EventName::Incoming, "x")).await, Delivery::Buffered);
    }
}
