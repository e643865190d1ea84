//! # Named-event dispatcher.
//!
//! [`EventDispatcher`] maps every [`EventKind`] to zero or one handler, plus a single
//! catch-all fallback. It is how the owning application reacts to a run: a
//! `Timeout` handler, for example, decides whether a stalled step is aborted.
//!
//! ## Resolution
//! ```text
//! emit(ev) ──► named[ev.kind]? ──yes──► handler(&ev, &handle)
//!                   │
//!                   no
//!                   ▼
//!              fallback? ──yes──► fallback(ev.name(), &ev, &handle)
//!                   │
//!                   no ──► dropped
//! ```
//!
//! ## Rules
//! - Binding a handler for a kind **replaces** the previous one.
//! - Emissions are never queued: an event with no handler is simply dropped.
//! - A panicking handler is caught and logged; it never unwinds into the run loop.
//! - Handlers are cloned out of the lock before being called, so a handler may
//!   rebind handlers (including itself) without deadlocking.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::Handle;
use crate::error::panic_message;

use super::event::{Event, EventKind};

/// Handler bound to one named event.
pub type Handler = Arc<dyn Fn(&Event, &Handle) + Send + Sync + 'static>;

/// Catch-all handler; receives the event name first.
pub type FallbackHandler = Arc<dyn Fn(&str, &Event, &Handle) + Send + Sync + 'static>;

#[derive(Default)]
struct Routes {
    named: HashMap<EventKind, Handler>,
    fallback: Option<FallbackHandler>,
}

enum Route {
    Named(Handler),
    Fallback(FallbackHandler),
}

/// Per-instance map from event kind to an optional handler, with one fallback slot.
#[derive(Default)]
pub struct EventDispatcher {
    routes: RwLock<Routes>,
}

impl EventDispatcher {
    /// Creates an empty dispatcher (every emission is dropped).
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `kind`, replacing any previous binding.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event, &Handle) + Send + Sync + 'static,
    {
        self.write().named.insert(kind, Arc::new(handler));
    }

    /// Removes the handler bound to `kind`. Returns `true` if one was bound.
    pub fn off(&self, kind: EventKind) -> bool {
        self.write().named.remove(&kind).is_some()
    }

    /// Binds the catch-all handler, replacing any previous one.
    pub fn on_other<F>(&self, handler: F)
    where
        F: Fn(&str, &Event, &Handle) + Send + Sync + 'static,
    {
        self.write().fallback = Some(Arc::new(handler));
    }

    /// True if a handler is bound specifically to `kind`.
    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.read().named.contains_key(&kind)
    }

    /// Delivers `ev` to its handler (or the fallback).
    ///
    /// Returns `true` if some handler ran to completion, `false` if the event was
    /// dropped or the handler panicked.
    pub fn dispatch(&self, ev: &Event, handle: &Handle) -> bool {
        let route = {
            let routes = self.read();
            match routes.named.get(&ev.kind) {
                Some(h) => Some(Route::Named(Arc::clone(h))),
                None => routes.fallback.as_ref().map(|h| Route::Fallback(Arc::clone(h))),
            }
        };

        let Some(route) = route else {
            return false;
        };
        let res = catch_unwind(AssertUnwindSafe(|| match route {
            Route::Named(h) => h(ev, handle),
            Route::Fallback(h) => h(ev.name(), ev, handle),
        }));
        match res {
            Ok(()) => true,
            Err(panic) => {
                tracing::error!(
                    event = ev.name(),
                    panic = %panic_message(panic.as_ref()),
                    "event handler panicked"
                );
                false
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Routes> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Routes> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }
}
