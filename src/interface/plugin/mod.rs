//! Host plugin boundary

pub mod bridge;
pub mod dto;
pub mod handler;

pub use bridge::ChannelHostBridge;
pub use dto::{EventEnvelope, PluginResponse};
pub use handler::PluginHandler;
