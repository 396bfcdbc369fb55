//! Application layer - Use cases and application services
//!
//! This layer orchestrates domain objects to fulfill use cases.
//! It's responsible for:
//! - Driving calls through their lifecycle
//! - Delivering or buffering host events
//! - Relaying peer-connection signaling
//! - Handling push tokens and payloads

pub mod coordinator;
pub mod dispatcher;
pub mod push;
pub mod signaling;

pub use coordinator::CallCoordinator;
pub use dispatcher::{Delivery, EventDispatcher, PendingEvents};
pub use push::{PushOutcome, PushService};
pub use signaling::{SignalingBridge, SignalingStatus};
