//! Shared kernel - types used across the call, signaling and push contexts

pub mod error;
pub mod events;
pub mod result;
pub mod value_objects;

pub use error::DomainError;
pub use result::Result;
pub use value_objects::CallId;
