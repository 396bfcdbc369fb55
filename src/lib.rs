//! callkit-bridge - Call UI plugin core
//!
//! Tracks VoIP calls reported by push notifications and the OS call UI, drives
//! them through their lifecycle, and delivers lifecycle events to a host app
//! that may not be running yet. An optional signaling bridge relays
//! offer/answer/ICE operations to a single peer connection.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
