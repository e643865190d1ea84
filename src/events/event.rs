//! # Lifecycle events emitted by a sequencer run.
//!
//! The [`EventKind`] enum names every emission a run can make. The [`Event`]
//! struct carries the metadata attached to it: the step name, the attempt number,
//! progress, an abort reason, and timer/backoff durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Within one run, events are emitted in the exact order the state machine
//! transitions, so `seq` also orders them across the bus and subscribers.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use aqueue::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::Timeout)
//!     .with_step("upload")
//!     .with_attempt(2)
//!     .with_timeout(Duration::from_millis(50));
//!
//! assert_eq!(ev.kind, EventKind::Timeout);
//! assert_eq!(ev.step.as_deref(), Some("upload"));
//! assert_eq!(ev.timeout_ms, Some(50));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of run events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A step is about to be handed control.
    ///
    /// Sets:
    /// - `step`: step name
    /// - `attempt`: dispatch number for this step (1-based)
    /// - `timeout_ms`: stall deadline armed for the dispatch
    Initiate,

    /// The active step signalled completion and was popped from the queue.
    ///
    /// Sets:
    /// - `step`: step name
    /// - `attempt`: dispatch number that completed
    Complete,

    /// The active step asked to be dispatched again.
    ///
    /// Sets:
    /// - `step`: step name
    /// - `attempt`: dispatch number that asked for the retry
    /// - `delay_ms`: backoff before re-dispatch (only if a backoff policy is configured)
    Retry,

    /// The active step proved liveness; the stall timer was re-armed.
    ///
    /// Sets:
    /// - `step`: step name
    /// - `attempt`: current dispatch number
    Pulse,

    /// The active step reported progress; the stall timer was re-armed.
    ///
    /// Sets:
    /// - `step`: step name
    /// - `attempt`: current dispatch number
    /// - `progress`: reported value
    Update,

    /// The stall timer fired with no intervening signal from the active step.
    ///
    /// Sets:
    /// - `step`: step name
    /// - `attempt`: current dispatch number
    /// - `timeout_ms`: the deadline that elapsed
    Timeout,

    /// The run was aborted. Terminal.
    ///
    /// Sets:
    /// - `step`: active step name (if any)
    /// - `reason`: why the run was aborted
    Abort,

    /// The queue drained. Terminal.
    Done,
}

impl EventKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [EventKind; 8] = [
        EventKind::Initiate,
        EventKind::Complete,
        EventKind::Retry,
        EventKind::Pulse,
        EventKind::Update,
        EventKind::Timeout,
        EventKind::Abort,
        EventKind::Done,
    ];

    /// Returns the stable event name (`"initiate"`, `"complete"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Initiate => "initiate",
            EventKind::Complete => "complete",
            EventKind::Retry => "retry",
            EventKind::Pulse => "pulse",
            EventKind::Update => "update",
            EventKind::Timeout => "timeout",
            EventKind::Abort => "abort",
            EventKind::Done => "done",
        }
    }

    /// True for events that end a run.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Abort | EventKind::Done)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the step, if applicable.
    pub step: Option<Arc<str>>,
    /// Dispatch number of the step (starting from 1).
    pub attempt: Option<u32>,
    /// Progress payload of an `Update`.
    pub progress: Option<f64>,
    /// Human-readable reason (abort cause, panic message, etc.).
    pub reason: Option<Arc<str>>,
    /// Stall deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Retry backoff in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            step: None,
            attempt: None,
            progress: None,
            reason: None,
            timeout_ms: None,
            delay_ms: None,
        }
    }

    /// Event name, same as `self.kind.as_str()`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Attaches a step name.
    #[inline]
    pub fn with_step(mut self, step: impl Into<Arc<str>>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Attaches a dispatch number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a progress value.
    #[inline]
    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a stall deadline (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
