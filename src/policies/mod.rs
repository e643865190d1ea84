//! Retry and stall policies.
//!
//! This module groups the knobs that control **how long** a retried step waits
//! before it is dispatched again and **what happens** when a step stalls.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid thundering herd
//! - [`TimeoutPolicy`] advisory vs. aborting stall handling
//!
//! ## Quick wiring
//! ```text
//! Config { retry_backoff: Option<BackoffPolicy>, timeout_policy: TimeoutPolicy, .. }
//!      └─► core::run uses:
//!           - retry_backoff.next(retries) to delay a re-dispatch
//!           - timeout_policy to decide whether a stall aborts
//! ```
//!
//! ## Defaults
//! - `retry_backoff = None` → retried steps are re-dispatched immediately.
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.
//! - `TimeoutPolicy::Advisory`.

mod backoff;
mod jitter;
mod timeout;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use timeout::TimeoutPolicy;
