//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] that fans
//! every run [`Event`](crate::Event) out to asynchronous observers.
//!
//! Subscribers complement the named handlers of the
//! [`EventDispatcher`](crate::EventDispatcher): handlers run inline with the state
//! machine and may steer the run through their [`Handle`](crate::Handle); subscribers
//! run on their own workers and only observe.
//!
//! ```text
//! Run::emit(ev) ──► EventDispatcher (inline, may steer)
//!               ──► SubscriberSet::emit ──► [queue S1] ─► worker ─► S1.on_event()
//!               │                       └─► [queue SN] ─► worker ─► SN.on_event()
//!               └─► Bus (broadcast receivers)
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
