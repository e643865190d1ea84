//! # Function-backed procedure (`ProcedureFn`)
//!
//! [`ProcedureFn`] wraps a closure `F: Fn(Handle) -> Fut`, producing a fresh future per
//! dispatch and spawning it on the current Tokio runtime. Retries get a new future;
//! nothing is shared between dispatches unless the closure captures an `Arc` explicitly.
//!
//! The spawned future races the dispatch's cancellation token: once the step is
//! resolved or the run is aborted, the future is dropped at its next await point.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use aqueue::{Handle, ProcedureFn};
//!
//! let step = ProcedureFn::new("wait", |h: Handle| async move {
//!     tokio::time::sleep(Duration::from_millis(10)).await;
//!     h.complete();
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::core::Handle;
use crate::error::ProcedureError;

use super::initiate::Initiate;

/// Async-closure procedure.
#[derive(Debug)]
pub struct ProcedureFn<F> {
    name: Arc<str>,
    f: F,
}

impl<F> ProcedureFn<F> {
    /// Creates a new function-backed procedure.
    pub fn new(name: impl Into<Arc<str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F, Fut> Initiate for ProcedureFn<F>
where
    F: Fn(Handle) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = ()> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn initiate(&self, handle: Handle) -> Result<(), ProcedureError> {
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            return Err(ProcedureError::fatal(
                self.name.to_string(),
                "no tokio runtime to spawn onto",
            ));
        };

        let token = handle.token();
        let fut = (self.f)(handle);
        rt.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        });
        Ok(())
    }
}
