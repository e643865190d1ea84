//! Sequencer core: queue, state machine, and the step-facing handle.
//!
//! Internal modules:
//! - [`sequencer`]: public [`Sequencer`] API, counters and run reports;
//! - [`run`]: the run state machine (dispatch, signals, stall detection);
//! - [`handle`]: the capability handed to every dispatched procedure;
//! - [`timer`]: single-shot resettable deadline;
//! - [`blackboard`]: the shared data slot;
//! - [`builder`]: construction with handlers and subscribers;
//! - [`config`]: sequencer settings.

mod blackboard;
mod builder;
mod config;
mod handle;
mod run;
mod sequencer;
mod timer;

pub use blackboard::Blackboard;
pub use builder::SequencerBuilder;
pub use config::Config;
pub use handle::Handle;
pub use sequencer::{Counts, RunOutcome, RunReport, RunState, Sequencer};
