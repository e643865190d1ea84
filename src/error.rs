//! Error types used by the sequencer and by procedures.
//!
//! This module defines two error enums:
//!
//! - [`SequencerError`] — errors raised by the sequencer API itself.
//! - [`ProcedureError`] — errors a procedure reports when it cannot be dispatched.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Neither is ever raised across the procedure boundary: a `ProcedureError`
//! returned from dispatch is turned into an implicit abort of the run.

use thiserror::Error;

/// # Errors produced by the sequencer API.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    /// `start` was called while a run is still in flight.
    #[error("sequencer is already running")]
    AlreadyRunning,
}

impl SequencerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use aqueue::SequencerError;
    ///
    /// assert_eq!(SequencerError::AlreadyRunning.as_label(), "sequencer_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SequencerError::AlreadyRunning => "sequencer_already_running",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SequencerError::AlreadyRunning => "a run is already in flight".to_string(),
        }
    }
}

/// # Errors produced while dispatching a procedure.
///
/// Returned by [`Initiate::initiate`](crate::Initiate::initiate). Any error is
/// fatal for the run: the sequencer aborts with the error text as the reason.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcedureError {
    /// The procedure does not support being initiated.
    #[error("procedure {step:?} cannot be initiated")]
    Unsupported {
        /// Name of the offending step.
        step: String,
    },

    /// The procedure is misconfigured and cannot run at all.
    #[error("procedure {step:?} failed to start: {reason}")]
    Fatal {
        /// Name of the offending step.
        step: String,
        /// The underlying error message.
        reason: String,
    },
}

impl ProcedureError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use aqueue::ProcedureError;
    ///
    /// let err = ProcedureError::Unsupported { step: "upload".into() };
    /// assert_eq!(err.as_label(), "procedure_unsupported");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcedureError::Unsupported { .. } => "procedure_unsupported",
            ProcedureError::Fatal { .. } => "procedure_fatal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ProcedureError::Unsupported { step } => format!("unsupported: {step}"),
            ProcedureError::Fatal { step, reason } => format!("fatal: {step}: {reason}"),
        }
    }

    /// Convenience constructor for [`ProcedureError::Fatal`].
    pub fn fatal(step: impl Into<String>, reason: impl Into<String>) -> Self {
        ProcedureError::Fatal {
            step: step.into(),
            reason: reason.into(),
        }
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
