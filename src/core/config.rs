//! # Sequencer configuration.
//!
//! Provides [`Config`] centralized settings for one sequencer.
//!
//! ## Sentinel values
//! - `timeout = 0s` → no stall detection (the timer is never armed)
//! - `max_retries = 0` → unlimited retries per step

use std::time::Duration;

use crate::policies::{BackoffPolicy, TimeoutPolicy};

/// Configuration for a [`Sequencer`](crate::Sequencer).
///
/// ## Field semantics
/// - `timeout`: inactivity deadline per dispatched step (`0s` = none)
/// - `timeout_policy`: whether a stall only reports or also aborts
/// - `max_retries`: retry cap per step (`0` = unlimited)
/// - `retry_backoff`: optional delay before a retried step is re-dispatched
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling sentinel
/// checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Inactivity deadline for a dispatched step.
    ///
    /// Armed on every dispatch and re-armed on every `pulse`/`update`. Can be changed
    /// between runs with [`Sequencer::set_timeout`](crate::Sequencer::set_timeout).
    pub timeout: Duration,

    /// What happens when the deadline elapses.
    pub timeout_policy: TimeoutPolicy,

    /// Maximum number of `retry()` calls honoured per step.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = the `(n + 1)`-th retry of one step aborts the run
    pub max_retries: u32,

    /// Delay applied before a retried step is dispatched again.
    ///
    /// `None` re-dispatches immediately.
    pub retry_backoff: Option<BackoffPolicy>,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the stall deadline as an `Option`.
    ///
    /// - `None` → no stall detection
    /// - `Some(d)` → timer armed for `d` on each dispatch
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns the per-step retry cap as an `Option`.
    #[inline]
    pub fn retry_limit(&self) -> Option<u32> {
        if self.max_retries == 0 {
            None
        } else {
            Some(self.max_retries)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `timeout = 10s`
    /// - `timeout_policy = TimeoutPolicy::Advisory` (report, never act)
    /// - `max_retries = 0` (unlimited)
    /// - `retry_backoff = None` (immediate re-dispatch)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            timeout_policy: TimeoutPolicy::default(),
            max_retries: 0,
            retry_backoff: None,
            bus_capacity: 1024,
        }
    }
}
