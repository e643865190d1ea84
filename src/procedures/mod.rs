//! # Procedures: the units of work a sequencer runs.
//!
//! This module provides:
//! - [`Procedure`] - tagged union of the two dispatchable shapes
//! - [`Initiate`] - capability trait for procedure objects
//! - [`ProcedureFn`] - async-closure procedure that spawns one future per dispatch

mod initiate;
mod procedure;
mod procedure_fn;

pub use initiate::Initiate;
pub use procedure::Procedure;
pub use procedure_fn::ProcedureFn;
