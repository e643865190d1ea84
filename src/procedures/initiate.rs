//! # Capability trait for procedure objects.
//!
//! An [`Initiate`] implementor is handed control through [`Initiate::initiate`]. It must
//! return promptly: anything slow is started here (spawned, scheduled, sent) and
//! resolved later through the [`Handle`].

use crate::core::Handle;
use crate::error::ProcedureError;

/// # Object capable of being initiated by a sequencer.
///
/// # Example
/// ```
/// use aqueue::{Handle, Initiate, ProcedureError};
///
/// struct Ping;
///
/// impl Initiate for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     fn initiate(&self, handle: Handle) -> Result<(), ProcedureError> {
///         handle.set_data("pong");
///         handle.complete();
///         Ok(())
///     }
/// }
/// ```
pub trait Initiate: Send + Sync + 'static {
    /// Returns a stable, human-readable step name.
    fn name(&self) -> &str;

    /// Takes control of the step.
    ///
    /// Returning `Err` means the procedure cannot run at all; the sequencer
    /// aborts the run with the error text as the reason.
    fn initiate(&self, handle: Handle) -> Result<(), ProcedureError>;
}
