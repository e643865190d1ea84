//! # Handle: how a procedure talks back to its sequencer.
//!
//! A [`Handle`] is handed to a procedure every time it is dispatched. The procedure
//! (or any task it spawns) uses it to resolve the step:
//!
//! ```text
//! procedure ──► handle.complete()  ──┐
//!           ──► handle.retry()     ──┤
//!           ──► handle.pulse()     ──┼──► Command ──► run mailbox ──► state machine
//!           ──► handle.update(p)   ──┤      (tagged with the dispatch id)
//!           ──► handle.abort()     ──┘
//! ```
//!
//! ## Rules
//! - Signals are **posted**, never executed inline: calling `complete()` from inside
//!   `initiate` cannot re-enter the run loop.
//! - A handle is bound to **one dispatch**. Once that dispatch is resolved (or the run
//!   is over), further signals from the handle are ignored.
//! - The cancellation token is cancelled when the dispatch is resolved or the run
//!   is aborted; long-running work should watch [`Handle::cancelled`].
//! - Data access (`get_data`/`set_data`) is synchronous and always live.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::blackboard::Blackboard;

/// What a handle asks the run loop to do.
#[derive(Debug, Clone)]
pub(crate) enum Signal {
    Complete,
    Retry,
    Pulse,
    Update(f64),
    Abort(Option<Arc<str>>),
}

/// A signal plus the dispatch it belongs to (`None` = run-level, from the application).
#[derive(Debug, Clone)]
pub(crate) struct Command {
    pub(crate) dispatch: Option<u64>,
    pub(crate) signal: Signal,
}

/// Capability handed to a dispatched procedure.
///
/// Cheap to clone; clones address the same dispatch.
#[derive(Clone, Debug)]
pub struct Handle {
    mailbox: mpsc::UnboundedSender<Command>,
    dispatch: u64,
    step: Arc<str>,
    attempt: u32,
    data: Blackboard,
    token: CancellationToken,
}

impl Handle {
    pub(crate) fn new(
        mailbox: mpsc::UnboundedSender<Command>,
        dispatch: u64,
        step: Arc<str>,
        attempt: u32,
        data: Blackboard,
        token: CancellationToken,
    ) -> Self {
        Self {
            mailbox,
            dispatch,
            step,
            attempt,
            data,
            token,
        }
    }

    /// A handle not attached to any run; every signal is dropped.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self::new(
            tx,
            0,
            Arc::from(""),
            0,
            Blackboard::new(),
            CancellationToken::new(),
        )
    }

    /// Marks the step as done; the sequencer moves on to the next one.
    pub fn complete(&self) {
        self.post(Signal::Complete);
    }

    /// Asks for the same step to be dispatched again.
    ///
    /// The step owns its retry bookkeeping; the sequencer only enforces
    /// [`Config::max_retries`](crate::Config::max_retries) when it is set.
    pub fn retry(&self) {
        self.post(Signal::Retry);
    }

    /// Proves liveness without resolving the step (re-arms the stall timer).
    pub fn pulse(&self) {
        self.post(Signal::Pulse);
    }

    /// Like [`pulse`](Self::pulse), and forwards `progress` as the event payload.
    pub fn update(&self, progress: f64) {
        self.post(Signal::Update(progress));
    }

    /// Ends the whole run.
    pub fn abort(&self) {
        self.post(Signal::Abort(None));
    }

    /// Ends the whole run with a reason carried on the `abort` event.
    pub fn abort_with(&self, reason: impl Into<Arc<str>>) {
        self.post(Signal::Abort(Some(reason.into())));
    }

    /// Returns a copy of the shared data slot.
    pub fn get_data(&self) -> Value {
        self.data.get()
    }

    /// Overwrites the shared data slot; visible immediately to every reader.
    pub fn set_data(&self, value: impl Into<Value>) {
        self.data.set(value);
    }

    /// The shared data slot itself (for in-place updates).
    pub fn data(&self) -> &Blackboard {
        &self.data
    }

    /// Name of the step this handle was issued to.
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Dispatch number of the step (1 on first dispatch, +1 per retry).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Token cancelled when this dispatch is resolved or the run is aborted.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// True once this dispatch is no longer active.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when this dispatch is no longer active.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    fn post(&self, signal: Signal) {
        let cmd = Command {
            dispatch: Some(self.dispatch),
            signal,
        };
        if self.mailbox.send(cmd).is_err() {
            tracing::trace!(step = %self.step, "signal dropped: run is over");
        }
    }
}
