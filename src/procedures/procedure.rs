//! # Procedure: callable or capability object.
//!
//! A [`Procedure`] is resolved once, at dispatch time, by matching on its variant:
//!
//! ```text
//! Procedure::Capability(obj) ──► obj.initiate(handle) ──► Ok / Err(ProcedureError)
//! Procedure::Callable{f}     ──► f(handle)             ──► Ok
//! ```
//!
//! An `Err` from dispatch (or a panic, caught by the run loop) is a fatal
//! configuration error and aborts the run.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::core::Handle;
use crate::error::ProcedureError;

use super::initiate::Initiate;
use super::procedure_fn::ProcedureFn;

/// Plain callable taking the dispatch handle.
pub type CallableFn = Arc<dyn Fn(Handle) + Send + Sync + 'static>;

/// One unit of work in a sequencer queue.
#[derive(Clone)]
pub enum Procedure {
    /// A bare callable invoked as `f(handle)`.
    Callable {
        /// Step name used in events and logs.
        name: Arc<str>,
        /// The callable.
        f: CallableFn,
    },
    /// An object exposing the [`Initiate`] capability.
    Capability(Arc<dyn Initiate>),
}

impl Procedure {
    /// Wraps a plain callable.
    ///
    /// # Example
    /// ```
    /// use aqueue::{Handle, Procedure};
    ///
    /// let step = Procedure::callable("noop", |h: Handle| h.complete());
    /// assert_eq!(step.name(), "noop");
    /// ```
    pub fn callable<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Handle) + Send + Sync + 'static,
    {
        Procedure::Callable {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    /// Wraps a capability object.
    pub fn capability<T: Initiate>(obj: T) -> Self {
        Procedure::Capability(Arc::new(obj))
    }

    /// Wraps a shared capability object.
    pub fn from_arc(obj: Arc<dyn Initiate>) -> Self {
        Procedure::Capability(obj)
    }

    /// Wraps an async closure; see [`ProcedureFn`].
    ///
    /// # Example
    /// ```
    /// use aqueue::{Handle, Procedure};
    ///
    /// let step = Procedure::future("fetch", |h: Handle| async move {
    ///     h.pulse();
    ///     h.complete();
    /// });
    /// assert_eq!(step.name(), "fetch");
    /// ```
    pub fn future<F, Fut>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Procedure::capability(ProcedureFn::new(name, f))
    }

    /// Returns the step name.
    pub fn name(&self) -> &str {
        match self {
            Procedure::Callable { name, .. } => name,
            Procedure::Capability(obj) => obj.name(),
        }
    }

    /// Hands control to the procedure.
    pub(crate) fn dispatch(&self, handle: Handle) -> Result<(), ProcedureError> {
        match self {
            Procedure::Capability(obj) => obj.initiate(handle),
            Procedure::Callable { f, .. } => {
                f(handle);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Procedure::Callable { .. } => "Callable",
            Procedure::Capability(_) => "Capability",
        };
        f.debug_struct("Procedure")
            .field("shape", &shape)
            .field("name", &self.name())
            .finish()
    }
}
