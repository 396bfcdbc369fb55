//! Host bridge port
//!
//! The host runtime (the app shell embedding this crate) owns the listener side
//! of every event. It attaches a bridge when its JS context is ready and
//! detaches it when the context goes away.

use crate::domain::call::event::HostEvent;

/// Delivery channel into the host app
#[cfg_attr(test, mockall::automock)]
pub trait HostBridge: Send + Sync {
    /// Whether the hosting process behind this bridge is still running.
    ///
    /// A bridge reference can outlive its process; delivery is only attempted
    /// when this returns true.
    fn is_alive(&self) -> bool;

    /// Hand an event to the host's listeners
    fn deliver(&self, event: &HostEvent) -> Result<(), String>;
}
