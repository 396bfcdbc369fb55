//! Domain errors

use crate::domain::shared::value_objects::CallId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The UUID does not name a registered call
    #[error("No such call: {0}")]
    UnknownCall(CallId),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Call already registered: {0}")]
    AlreadyExists(String),

    /// Peer-connection operation failed
    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Errors the host boundary resolves with a neutral acknowledgment instead of
    /// rejecting.
    pub fn is_neutral(&self) -> bool {
        !matches!(self, DomainError::Signaling(_) | DomainError::Internal(_))
    }
}
