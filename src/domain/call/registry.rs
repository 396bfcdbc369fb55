//! In-memory call registry

use crate::domain::call::aggregate::Call;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use std::collections::HashMap;

/// Registry of active calls, keyed by UUID.
///
/// Holds at most one call per UUID and only gives up a call once it has
/// reached a terminal state.
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: HashMap<CallId, Call>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, call: Call) -> Result<()> {
        let id = call.id();
        if self.calls.contains_key(&id) {
            return Err(DomainError::AlreadyExists(id.to_string()));
        }
        self.calls.insert(id, call);
        Ok(())
    }

    pub fn get(&self, id: &CallId) -> Option<&Call> {
        self.calls.get(id)
    }

    /// Mutable access, failing with `UnknownCall` when absent
    pub fn require_mut(&mut self, id: &CallId) -> Result<&mut Call> {
        self.calls
            .get_mut(id)
            .ok_or(DomainError::UnknownCall(*id))
    }

    pub fn contains(&self, id: &CallId) -> bool {
        self.calls.contains_key(id)
    }

    /// Remove a call that has finished its terminal transition
    pub fn remove_terminated(&mut self, id: &CallId) -> Result<Call> {
        match self.calls.get(id) {
            None => Err(DomainError::UnknownCall(*id)),
            Some(call) if !call.is_terminal() => Err(DomainError::InvalidTransition(format!(
                "Call {} is still {} and cannot be removed",
                id,
                call.state().name()
            ))),
            Some(_) => self.calls.remove(id).ok_or(DomainError::UnknownCall(*id)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Call> {
        self.calls.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Call> {
        self.calls.values_mut()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
