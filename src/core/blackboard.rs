//! # Shared data slot.
//!
//! [`Blackboard`] is the single mutable value every step of a sequencer can read and
//! write. It is not scoped per step and keeps no history: the last writer wins and
//! the write is visible to the very next read, including one made by the writer.
//!
//! Procedures are allowed to be plain synchronous callables, so the slot sits
//! behind a `std::sync::RwLock` (never held across an `.await`).

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

/// Cloneable handle to one shared [`Value`] slot (initially `Null`).
#[derive(Clone, Debug, Default)]
pub struct Blackboard {
    slot: Arc<RwLock<Value>>,
}

impl Blackboard {
    /// Creates an empty (`Null`) slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> Value {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the current value, returning the previous one.
    pub fn set(&self, value: impl Into<Value>) -> Value {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, value.into())
    }

    /// Mutates the value in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut slot)
    }
}
