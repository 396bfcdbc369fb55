//! Call bounded context - registry and lifecycle of calls

pub mod aggregate;
pub mod entity;
pub mod event;
pub mod registry;
pub mod value_object;

pub use aggregate::Call;
pub use entity::CallData;
pub use event::{EventName, HostEvent, PendingCategory};
pub use registry::CallRegistry;
pub use value_object::{CallDirection, CallState, EndReason};
