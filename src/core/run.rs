//! # Run: the sequencer state machine.
//!
//! A [`Run`] drives one pass over the pending queue. It owns the stall [`Timer`], the
//! retry backoff timer, and the receiving end of the mailbox every [`Handle`] posts to.
//!
//! ## Event flow
//! ```text
//! advance():
//!   pending empty ──► disarm ──► Done
//!   else          ──► Initiate ──► arm timer ──► initiated += 1 ──► dispatch(head)
//!                                                                     └─ Err/panic ──► abort
//!
//! loop (biased select):
//!   mailbox ─► Complete ──► disarm ──► Complete ──► pop, completed += 1 ──► advance()
//!           ─► Retry    ──► disarm ──► Retry ──► [backoff ──► Retrying] ──► advance()
//!           ─► Pulse    ──► re-arm ──► Pulse
//!           ─► Update   ──► re-arm ──► Update(progress)
//!           ─► Abort    ──► disarm ──► clear pending ──► Abort
//!   timer   ─► Timeout  ──► Stalled  [TimeoutPolicy::Abort ──► abort]
//!   backoff ─► advance()
//! ```
//!
//! ## Rules
//! - Exactly **one** step is dispatched at a time; signals are handled in arrival order.
//! - Signals tagged with a dispatch other than the active one are **ignored**.
//! - The mailbox is polled **before** the timers, so a signal that arrived before a
//!   deadline always disarms it first.
//! - After `Done` or `Abort` nothing else is emitted for this run.
//! - `pending` only shrinks on `complete` (pop) and `abort` (clear).

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{SequencerError, panic_message};
use crate::events::{Event, EventKind};
use crate::policies::TimeoutPolicy;

use super::handle::{Command, Handle, Signal};
use super::sequencer::{Counts, Inner, RunOutcome, RunReport, RunState};
use super::timer::Timer;

/// One pass over the pending queue.
pub(crate) struct Run {
    inner: Arc<Inner>,
    rx: mpsc::UnboundedReceiver<Command>,
    tx: mpsc::UnboundedSender<Command>,
    /// Stall deadline for this run (snapshot of the ledger at `begin`).
    timeout: Option<Duration>,
    stall: Timer,
    backoff: Timer,
    state: RunState,
    /// Id of the latest dispatch; handles carry it back in their commands.
    dispatch: u64,
    /// Dispatches of the current head (1-based once dispatched).
    attempt: u32,
    /// Retries requested by the current head.
    retries: u32,
    step: Arc<str>,
    token: CancellationToken,
    report: Option<RunReport>,
}

impl Run {
    /// Claims the sequencer for a new run.
    ///
    /// Resets `initiated`/`completed`, snapshots `queued` and opens a fresh mailbox.
    pub(crate) fn begin(inner: Arc<Inner>) -> Result<Self, SequencerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let timeout = {
            let mut ledger = inner.ledger();
            if ledger.state.is_active() {
                return Err(SequencerError::AlreadyRunning);
            }
            ledger.counts = Counts {
                queued: ledger.pending.len(),
                initiated: 0,
                completed: 0,
            };
            ledger.state = RunState::Dispatched;
            ledger.mailbox = Some(tx.clone());
            ledger.timeout
        };

        Ok(Self {
            inner,
            rx,
            tx,
            timeout,
            stall: Timer::new(),
            backoff: Timer::new(),
            state: RunState::Dispatched,
            dispatch: 0,
            attempt: 0,
            retries: 0,
            step: Arc::from(""),
            token: CancellationToken::new(),
            report: None,
        })
    }

    /// Drives the run until the queue drains or the run is aborted.
    pub(crate) async fn drive(mut self) -> RunReport {
        self.advance();

        loop {
            if let Some(report) = self.report.take() {
                return report;
            }
            tokio::select! {
                biased;
                Some(cmd) = self.rx.recv() => self.apply(cmd),
                _ = self.stall.expired() => self.on_stall(),
                _ = self.backoff.expired() => self.advance(),
            }
        }
    }

    fn apply(&mut self, cmd: Command) {
        if let Some(id) = cmd.dispatch {
            let live = matches!(self.state, RunState::Dispatched | RunState::Stalled);
            if id != self.dispatch || !live {
                tracing::debug!(
                    step = %self.step,
                    dispatch = id,
                    active = self.dispatch,
                    signal = ?cmd.signal,
                    "ignoring signal from a resolved dispatch"
                );
                return;
            }
        }

        match cmd.signal {
            Signal::Complete => self.complete(),
            Signal::Retry => self.retry(),
            Signal::Pulse => self.pulse(None),
            Signal::Update(progress) => self.pulse(Some(progress)),
            Signal::Abort(reason) => {
                let reason = reason.unwrap_or_else(|| Arc::from("aborted by step"));
                self.abort(reason)
            }
        }
    }

    /// Dispatches the head of `pending`, or finishes the run if it is empty.
    fn advance(&mut self) {
        let head = self.inner.ledger().pending.front().cloned();
        let Some(procedure) = head else {
            self.stall.disarm();
            self.finish(RunState::Done, RunOutcome::Done);
            self.emit(Event::new(EventKind::Done));
            return;
        };

        self.dispatch += 1;
        self.attempt += 1;
        self.step = Arc::from(procedure.name());
        self.token = CancellationToken::new();
        self.set_state(RunState::Dispatched);

        let mut ev = Event::new(EventKind::Initiate)
            .with_step(Arc::clone(&self.step))
            .with_attempt(self.attempt);
        if let Some(t) = self.timeout {
            ev = ev.with_timeout(t);
        }
        self.emit(ev);

        if let Some(t) = self.timeout {
            self.stall.arm(t);
        }
        self.inner.ledger().counts.initiated += 1;

        let handle = self.handle();
        match catch_unwind(AssertUnwindSafe(|| procedure.dispatch(handle))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(
                    step = %self.step,
                    error = %e,
                    label = e.as_label(),
                    "procedure rejected dispatch"
                );
                self.abort(Arc::from(e.to_string()));
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                tracing::error!(step = %self.step, panic = %msg, "procedure panicked during dispatch");
                self.abort(Arc::from(format!(
                    "procedure {:?} panicked: {msg}",
                    &*self.step
                )));
            }
        }
    }

    fn complete(&mut self) {
        self.stall.disarm();
        self.token.cancel();
        self.emit(self.step_event(EventKind::Complete));

        {
            let mut ledger = self.inner.ledger();
            ledger.pending.pop_front();
            ledger.counts.completed += 1;
        }
        self.attempt = 0;
        self.retries = 0;
        self.advance();
    }

    fn retry(&mut self) {
        self.stall.disarm();
        self.token.cancel();
        self.retries += 1;

        if let Some(limit) = self.inner.cfg.retry_limit() {
            if self.retries > limit {
                self.abort(Arc::from(format!(
                    "retry limit exceeded: step {:?} retried more than {limit} times",
                    &*self.step
                )));
                return;
            }
        }

        let delay = self
            .inner
            .cfg
            .retry_backoff
            .map(|b| b.next(self.retries - 1))
            .filter(|d| !d.is_zero());

        let mut ev = self.step_event(EventKind::Retry);
        if let Some(d) = delay {
            ev = ev.with_delay(d);
        }
        self.emit(ev);

        match delay {
            Some(d) => {
                self.set_state(RunState::Retrying);
                self.backoff.arm(d);
            }
            None => self.advance(),
        }
    }

    /// `pulse` (no progress) or `update` (with progress): re-arm and report.
    fn pulse(&mut self, progress: Option<f64>) {
        self.stall.disarm();
        if let Some(t) = self.timeout {
            self.stall.arm(t);
        }
        if self.state == RunState::Stalled {
            tracing::info!(step = %self.step, "stalled step resumed");
            self.set_state(RunState::Dispatched);
        }

        let ev = match progress {
            Some(p) => self.step_event(EventKind::Update).with_progress(p),
            None => self.step_event(EventKind::Pulse),
        };
        self.emit(ev);
    }

    fn on_stall(&mut self) {
        let timeout = self.timeout.unwrap_or_default();
        tracing::warn!(step = %self.step, attempt = self.attempt, ?timeout, "step stalled");
        self.set_state(RunState::Stalled);
        self.emit(self.step_event(EventKind::Timeout).with_timeout(timeout));

        if self.inner.cfg.timeout_policy == TimeoutPolicy::Abort {
            self.abort(Arc::from(format!(
                "step {:?} timed out after {timeout:?}",
                &*self.step
            )));
        }
    }

    fn abort(&mut self, reason: Arc<str>) {
        self.stall.disarm();
        self.backoff.disarm();
        self.token.cancel();

        let abandoned: Vec<String> = {
            let mut ledger = self.inner.ledger();
            ledger.pending.drain(..).map(|p| p.name().to_string()).collect()
        };
        tracing::warn!(step = %self.step, %reason, abandoned = abandoned.len(), "run aborted");

        let mut ev = Event::new(EventKind::Abort).with_reason(Arc::clone(&reason));
        if !self.step.is_empty() {
            ev = ev.with_step(Arc::clone(&self.step));
        }
        self.finish(RunState::Aborted, RunOutcome::Aborted { reason, abandoned });
        self.emit(ev);
    }

    /// Moves to a terminal state and releases the sequencer for the next `start`.
    fn finish(&mut self, state: RunState, outcome: RunOutcome) {
        self.state = state;
        let counts = {
            let mut ledger = self.inner.ledger();
            ledger.state = state;
            ledger.mailbox = None;
            ledger.counts
        };
        self.report = Some(RunReport { outcome, counts });
    }

    fn set_state(&mut self, state: RunState) {
        self.state = state;
        self.inner.ledger().state = state;
    }

    fn step_event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_step(Arc::clone(&self.step))
            .with_attempt(self.attempt)
    }

    fn handle(&self) -> Handle {
        Handle::new(
            self.tx.clone(),
            self.dispatch,
            Arc::clone(&self.step),
            self.attempt,
            self.inner.data.clone(),
            self.token.clone(),
        )
    }

    fn emit(&self, ev: Event) {
        self.inner.emit(ev, &self.handle());
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        // `start()` future dropped mid-run.
        self.token.cancel();
        let mut ledger = self.inner.ledger();
        ledger.state = RunState::Aborted;
        ledger.mailbox = None;
        tracing::warn!(step = %self.step, "run dropped before reaching a terminal state");
    }
}
