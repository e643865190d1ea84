//! Run events: types, broadcast bus, and the named-event dispatcher.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//! - [`EventDispatcher`] per-sequencer map of named handlers with a fallback
//!
//! ## Quick reference
//! - **Publisher**: the run loop in `core::run` (one emission per state transition).
//! - **Consumers**: the dispatcher (synchronous application handlers), the bus
//!   (`Sequencer::subscribe`), and the `SubscriberSet` workers.

mod bus;
mod dispatcher;
mod event;

pub use bus::Bus;
pub use dispatcher::{EventDispatcher, FallbackHandler, Handler};
pub use event::{Event, EventKind};
