//! # What a run does when its stall timer fires.
//!
//! - [`TimeoutPolicy::Advisory`] the `timeout` event is emitted and the run stalls
//!   until a handler (or the step itself) resolves it. Default.
//! - [`TimeoutPolicy::Abort`] the `timeout` event is emitted, then the run aborts.
//!
//! ```text
//! timer fires ──► emit Timeout ──► Advisory: state = Stalled (waits for a signal)
//!                               └─► Abort:    abort("timed out after ..")
//! ```

/// Reaction to a stalled step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Report only; the application decides (default).
    #[default]
    Advisory,
    /// Report, then abort the run.
    Abort,
}
