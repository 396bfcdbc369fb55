//! Domain layer - call lifecycle rules and the ports to the outside world
//!
//! This layer contains:
//! - The Call aggregate and its registry
//! - Value objects for call state, signaling and events
//! - Port traits for the host bridge, OS telephony, peer connections, settings
//!   and outbound HTTP callbacks

pub mod call;
pub mod callback;
pub mod host;
pub mod push;
pub mod shared;
pub mod signaling;
pub mod telephony;

// Re-export commonly used types
pub use shared::{DomainError, Result};
