//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Settings persistence
//! - Outbound HTTP for server callbacks
//! - Telephony provider implementations
//! - Protocol implementations (WebRTC)

pub mod http;
pub mod persistence;
pub mod protocols;
pub mod telephony;
