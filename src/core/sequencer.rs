//! # Sequencer: public API over a queue of procedures.
//!
//! The [`Sequencer`] owns the pending queue, the shared [`Blackboard`], the event
//! dispatcher and the observability plumbing. [`Sequencer::start`] hands the queue
//! to a [`Run`](super::run::Run), which drives it to a terminal state.
//!
//! ## Architecture
//! ```text
//! Sequencer (cheap clone, Arc<Inner>)
//!   ├─ Ledger (Mutex)        pending: VecDeque<Procedure>, counts, state, timeout, mailbox
//!   ├─ Blackboard (RwLock)   shared serde_json::Value
//!   ├─ EventDispatcher       named handlers + fallback
//!   ├─ Bus                   broadcast of every Event
//!   └─ SubscriberSet         async observers (LogWriter, metrics, ...)
//!
//! start() ──► Run::begin() ──► Run::drive() ──► RunReport
//! ```
//!
//! ## Rules
//! - One run at a time: `start()` while a run is active returns
//!   [`SequencerError::AlreadyRunning`].
//! - Completed procedures are popped, so a later `start()` **resumes** with
//!   whatever is still pending instead of replaying from the top.
//! - An aborted run clears `pending`; the names are reported in [`RunOutcome::Aborted`].
//! - The ledger lock is never held while user code (procedures, handlers) runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::error::SequencerError;
use crate::events::{Bus, Event, EventDispatcher, EventKind};
use crate::procedures::Procedure;
use crate::subscribers::SubscriberSet;

use super::blackboard::Blackboard;
use super::builder::SequencerBuilder;
use super::config::Config;
use super::handle::{Command, Handle, Signal};
use super::run::Run;

/// Run counters.
///
/// `queued` is a snapshot taken at `start`; `initiated` counts every dispatch,
/// retries included; `completed` counts steps that signalled `complete`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    /// Pending length when the run started.
    pub queued: usize,
    /// Dispatches handed out (retries included).
    pub initiated: usize,
    /// Steps popped via `complete`.
    pub completed: usize,
}

/// State of the sequencer's current (or last) run.
///
/// ```text
/// Idle ──start──► Dispatched ──complete/retry──► Dispatched ...
///                    │  ▲  └──retry (backoff)──► Retrying ──delay──► Dispatched
///                    │  └──pulse/update── Stalled ◄──timer fires──┘
///                    ├──queue drained──► Done
///                    └──abort──────────► Aborted
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    /// Never started.
    #[default]
    Idle,
    /// A step holds control and the stall timer is armed.
    Dispatched,
    /// A step asked for a retry and waits out its backoff.
    Retrying,
    /// The stall timer fired; waiting for a signal or an abort.
    Stalled,
    /// The queue drained.
    Done,
    /// The run was aborted.
    Aborted,
}

impl RunState {
    /// True while a run is in flight.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Dispatched | RunState::Retrying | RunState::Stalled
        )
    }

    /// True once a run ended (drained or aborted).
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    /// Every pending procedure completed.
    Done,
    /// The run was aborted.
    Aborted {
        /// Why the run was aborted.
        reason: Arc<str>,
        /// Names of procedures that were still pending (the active one first).
        abandoned: Vec<String>,
    },
}

/// Summary returned by [`Sequencer::start`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Final counters.
    pub counts: Counts,
}

impl RunReport {
    /// True if the queue drained.
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, RunOutcome::Done)
    }

    /// Abort reason, if the run was aborted.
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Aborted { reason, .. } => Some(reason),
            RunOutcome::Done => None,
        }
    }
}

/// Mutable bookkeeping guarded by one mutex.
pub(crate) struct Ledger {
    pub(crate) pending: VecDeque<Procedure>,
    pub(crate) counts: Counts,
    pub(crate) state: RunState,
    pub(crate) timeout: Option<Duration>,
    /// Mailbox of the active run (`None` when idle or terminal).
    pub(crate) mailbox: Option<mpsc::UnboundedSender<Command>>,
}

pub(crate) struct Inner {
    pub(crate) cfg: Config,
    pub(crate) ledger: Mutex<Ledger>,
    pub(crate) data: Blackboard,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) bus: Bus,
    pub(crate) subs: SubscriberSet,
}

impl Inner {
    pub(crate) fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers one event: application handler, subscribers, then the bus.
    pub(crate) fn emit(&self, ev: Event, handle: &Handle) {
        tracing::debug!(
            seq = ev.seq,
            event = ev.name(),
            step = ev.step.as_deref().unwrap_or(""),
            attempt = ev.attempt,
            "sequencer event"
        );
        self.dispatcher.dispatch(&ev, handle);
        self.subs.emit(&ev);
        self.bus.publish(ev);
    }
}

/// Runs procedures one at a time, in `add` order.
///
/// Cloning is cheap; clones share the same queue, data slot and handlers.
///
/// # Example
/// ```rust
/// use aqueue::{Config, Handle, Procedure, Sequencer};
/// use serde_json::json;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let seq = Sequencer::new(Config::default());
///     seq.add(Procedure::callable("write", |h: Handle| {
///         h.set_data(json!("x"));
///         h.complete();
///     }));
///     seq.add(Procedure::callable("read", |h: Handle| {
///         assert_eq!(h.get_data(), json!("x"));
///         h.complete();
///     }));
///
///     let report = seq.start().await.expect("not running");
///     assert!(report.is_done());
///     assert_eq!(report.counts.completed, 2);
/// }
/// ```
#[derive(Clone)]
pub struct Sequencer {
    pub(crate) inner: Arc<Inner>,
}

impl Sequencer {
    /// Creates a sequencer with no handlers and no subscribers.
    pub fn new(cfg: Config) -> Self {
        SequencerBuilder::new(cfg).build()
    }

    /// Returns a builder for handlers, subscribers and initial procedures.
    pub fn builder(cfg: Config) -> SequencerBuilder {
        SequencerBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: Config,
        dispatcher: EventDispatcher,
        subs: SubscriberSet,
        pending: VecDeque<Procedure>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let ledger = Ledger {
            pending,
            counts: Counts::default(),
            state: RunState::Idle,
            timeout: cfg.default_timeout(),
            mailbox: None,
        };
        Self {
            inner: Arc::new(Inner {
                cfg,
                ledger: Mutex::new(ledger),
                data: Blackboard::new(),
                dispatcher,
                bus,
                subs,
            }),
        }
    }

    /// Appends a procedure to the tail of the queue.
    ///
    /// Allowed at any time; during a run the new step will be reached in order
    /// (the `queued` snapshot of the active run is not changed).
    pub fn add(&self, procedure: Procedure) {
        self.inner.ledger().pending.push_back(procedure);
    }

    /// Adds every procedure in order, then [`start`](Self::start)s.
    ///
    /// If a run is already active the procedures are still appended (the active
    /// run will reach them) and `AlreadyRunning` is returned.
    pub async fn execute<I>(&self, procedures: I) -> Result<RunReport, SequencerError>
    where
        I: IntoIterator<Item = Procedure>,
    {
        {
            let mut ledger = self.inner.ledger();
            ledger.pending.extend(procedures);
        }
        self.start().await
    }

    /// Runs the pending queue to a terminal state.
    ///
    /// Resets `initiated`/`completed`, snapshots `queued`, dispatches the head and
    /// drives the run until the queue drains or the run is aborted. A run whose step
    /// stalls under [`TimeoutPolicy::Advisory`](crate::TimeoutPolicy::Advisory) does
    /// not finish until something resolves or aborts it.
    ///
    /// Dropping the returned future mid-run ends the run without emitting `abort`;
    /// the active step's token is cancelled and the queue is left as is.
    pub async fn start(&self) -> Result<RunReport, SequencerError> {
        let run = Run::begin(Arc::clone(&self.inner))?;
        Ok(run.drive().await)
    }

    /// Aborts the active run from application code.
    ///
    /// Returns `false` if no run is active.
    pub fn abort(&self) -> bool {
        self.abort_with("aborted by application")
    }

    /// Like [`abort`](Self::abort), with a custom reason.
    pub fn abort_with(&self, reason: impl Into<Arc<str>>) -> bool {
        let ledger = self.inner.ledger();
        let Some(mailbox) = ledger.mailbox.as_ref() else {
            return false;
        };
        mailbox
            .send(Command {
                dispatch: None,
                signal: Signal::Abort(Some(reason.into())),
            })
            .is_ok()
    }

    /// Binds `handler` to `kind`, replacing any previous binding.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event, &Handle) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on(kind, handler);
    }

    /// Binds the catch-all handler, receiving `(event_name, event, handle)`.
    pub fn on_other<F>(&self, handler: F)
    where
        F: Fn(&str, &Event, &Handle) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on_other(handler);
    }

    /// Unbinds the handler for `kind`.
    pub fn off(&self, kind: EventKind) -> bool {
        self.inner.dispatcher.off(kind)
    }

    /// Receiver for every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Changes the stall deadline used by the next run (`0s` disables it).
    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.ledger().timeout = (!timeout.is_zero()).then_some(timeout);
    }

    /// Stall deadline the next run will use.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.ledger().timeout
    }

    /// Returns a copy of the shared data slot.
    pub fn get_data(&self) -> Value {
        self.inner.data.get()
    }

    /// Overwrites the shared data slot.
    pub fn set_data(&self, value: impl Into<Value>) {
        self.inner.data.set(value);
    }

    /// The shared data slot.
    pub fn blackboard(&self) -> &Blackboard {
        &self.inner.data
    }

    /// Counters of the current (or last) run.
    pub fn counts(&self) -> Counts {
        self.inner.ledger().counts
    }

    /// State of the current (or last) run.
    pub fn state(&self) -> RunState {
        self.inner.ledger().state
    }

    /// Number of pending procedures (the active one included).
    pub fn len(&self) -> usize {
        self.inner.ledger().pending.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.ledger().pending.is_empty()
    }

    /// Names of pending procedures, head first.
    pub fn pending_names(&self) -> Vec<String> {
        self.inner
            .ledger()
            .pending
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Configuration this sequencer was built with.
    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.inner.ledger();
        f.debug_struct("Sequencer")
            .field("state", &ledger.state)
            .field("pending", &ledger.pending.len())
            .field("counts", &ledger.counts)
            .finish()
    }
}
