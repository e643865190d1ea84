//! # aqueue
//!
//! **aqueue** is an asynchronous procedure sequencer for Rust.
//!
//! It runs an ordered list of steps ("procedures") strictly one at a time. Each step
//! is asynchronous: it is handed a [`Handle`] and must explicitly signal when it is
//! done, wants to run again, or is merely making slow progress. A stall timer reports
//! steps that go quiet.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Procedure   Procedure   Procedure        (Callable fn or Initiate object)
//!       │           │           │
//!       ▼           ▼           ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Sequencer                                                   │
//! │  - pending: VecDeque<Procedure> (FIFO, head = active step)   │
//! │  - Blackboard (shared serde_json::Value)                     │
//! │  - EventDispatcher (named handlers + fallback)               │
//! │  - Bus + SubscriberSet (observers)                           │
//! └──────────────┬───────────────────────────────────────────────┘
//!                │ start()
//!                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Run (state machine)                                         │
//! │  - stall Timer, retry backoff Timer                          │
//! │  - mailbox ◄── Command ◄── Handle (complete/retry/pulse/..)  │
//! └──────────────┬───────────────────────────────────────────────┘
//!                │ emits
//!                ▼
//!   initiate · complete · retry · pulse · update · timeout · abort · done
//! ```
//!
//! ### Lifecycle
//! ```text
//! start()
//!   ├─► queued = len(pending); initiated = completed = 0
//!   └─► advance():
//!         ├─ pending empty ─► Done (terminal)
//!         └─ emit initiate, arm timer, initiated += 1, dispatch(head)
//!
//! signals from the active step:
//!   complete ─► pop head, completed += 1, advance()
//!   retry    ─► [backoff], advance() on the same head
//!   pulse    ─► re-arm timer
//!   update   ─► re-arm timer, report progress
//!   abort    ─► clear pending ─► Aborted (terminal)
//!
//! timer fires ─► emit timeout; run stalls until a handler or the step acts
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Sequencing**    | Queue procedures and drive them one at a time.               | [`Sequencer`], [`RunReport`], [`RunState`]  |
//! | **Procedures**    | Callables, capability objects, async closures.               | [`Procedure`], [`Initiate`], [`ProcedureFn`]|
//! | **Step control**  | Resolve, retry, prove liveness, share data.                  | [`Handle`], [`Blackboard`]                  |
//! | **Events**        | Named handlers, broadcast bus, async subscribers.            | [`EventDispatcher`], [`Event`], [`Subscribe`]|
//! | **Policies**      | Retry backoff with jitter, stall handling.                   | [`BackoffPolicy`], [`TimeoutPolicy`]        |
//! | **Errors**        | Typed errors for the API and for dispatch.                   | [`SequencerError`], [`ProcedureError`]      |
//! | **Configuration** | Centralize settings.                                         | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], a subscriber that forwards events to `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use aqueue::{Config, EventKind, Handle, Procedure, Sequencer};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut cfg = Config::default();
//!     cfg.timeout = Duration::from_secs(5);
//!
//!     let seq = Sequencer::builder(cfg)
//!         // A stalled step is only reported; this handler decides to give up.
//!         .on(EventKind::Timeout, |_ev, handle| handle.abort_with("stalled"))
//!         .build();
//!
//!     seq.add(Procedure::future("connect", |h: Handle| async move {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!         h.set_data("session-1");
//!         h.complete();
//!     }));
//!     seq.add(Procedure::callable("use", |h: Handle| {
//!         assert_eq!(h.get_data(), "session-1");
//!         h.complete();
//!     }));
//!
//!     let report = seq.start().await.expect("idle sequencer");
//!     assert!(report.is_done());
//!     assert_eq!(report.counts.completed, 2);
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod procedures;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    Blackboard, Config, Counts, Handle, RunOutcome, RunReport, RunState, Sequencer,
    SequencerBuilder,
};
pub use error::{ProcedureError, SequencerError};
pub use events::{Bus, Event, EventDispatcher, EventKind, FallbackHandler, Handler};
pub use policies::{BackoffPolicy, JitterPolicy, TimeoutPolicy};
pub use procedures::{Initiate, Procedure, ProcedureFn};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: built-in tracing-backed subscriber.
// Enabled by default; opt out with `default-features = false`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
