//! # Single-shot, resettable deadline.
//!
//! [`Timer`] detects a stalled step. It is owned by exactly one run and never shared.
//!
//! ## Rules
//! - `arm()` while armed **replaces** the previous deadline (no overlapping timers).
//! - `expired()` resolves at most once per `arm()` and leaves the timer disarmed.
//! - A disarmed timer never resolves; `expired()` pends forever.
//! - The run loop polls its mailbox before the timer (`biased` select), so a
//!   `disarm()` caused by a command that arrived before the deadline always wins.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{self, Sleep};

/// One pending deadline.
#[derive(Debug, Default)]
pub(crate) struct Timer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arms a fresh deadline `after` from now, discarding any previous one.
    pub(crate) fn arm(&mut self, after: Duration) {
        self.sleep = Some(Box::pin(time::sleep(after)));
    }

    /// Drops the pending deadline, if any.
    pub(crate) fn disarm(&mut self) {
        self.sleep = None;
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Instant at which the armed deadline fires.
    #[cfg(test)]
    pub(crate) fn deadline(&self) -> Option<time::Instant> {
        self.sleep.as_ref().map(|s| s.deadline())
    }

    /// Resolves when the armed deadline elapses, then self-disarms.
    ///
    /// Cancel-safe: dropping the future before it resolves keeps the deadline armed.
    pub(crate) async fn expired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.disarm();
            }
            None => future::pending::<()>().await,
        }
    }
}
