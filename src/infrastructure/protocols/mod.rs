//! Protocol implementations

#[cfg(feature = "native-webrtc")]
pub mod webrtc;
