//! WebRTC protocol implementation
pub mod peer;

pub use peer::{NativePeerConnection, NativePeerConnectionFactory};
