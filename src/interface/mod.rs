//! Interface layer - External interfaces
//!
//! This layer handles:
//! - Host method dispatch
//! - Event delivery to host listeners
//! - Request/response formatting

pub mod plugin;
