//! # LogWriter — tracing-backed event logger
//!
//! A subscriber that turns every [`Event`] into a `tracing` record under the
//! `aqueue::events` target. Install any `tracing` subscriber to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO aqueue::events: initiate step="upload" attempt=1 timeout_ms=5000
//! INFO aqueue::events: retry step="upload" attempt=1 delay_ms=200
//! DEBUG aqueue::events: update step="upload" attempt=2 progress=0.5
//! WARN aqueue::events: timeout step="upload" attempt=2 timeout_ms=5000
//! INFO aqueue::events: complete step="upload" attempt=2
//! WARN aqueue::events: abort step="verify" reason="retry limit exceeded"
//! INFO aqueue::events: done
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let step = e.step.as_deref().unwrap_or("");
        match e.kind {
            EventKind::Initiate => {
                tracing::info!(target: "aqueue::events", step, attempt = e.attempt, timeout_ms = e.timeout_ms, "initiate");
            }
            EventKind::Complete => {
                tracing::info!(target: "aqueue::events", step, attempt = e.attempt, "complete");
            }
            EventKind::Retry => {
                tracing::info!(target: "aqueue::events", step, attempt = e.attempt, delay_ms = e.delay_ms, "retry");
            }
            EventKind::Pulse => {
                tracing::debug!(target: "aqueue::events", step, attempt = e.attempt, "pulse");
            }
            EventKind::Update => {
                tracing::debug!(target: "aqueue::events", step, attempt = e.attempt, progress = e.progress, "update");
            }
            EventKind::Timeout => {
                tracing::warn!(target: "aqueue::events", step, attempt = e.attempt, timeout_ms = e.timeout_ms, "timeout");
            }
            EventKind::Abort => {
                tracing::warn!(target: "aqueue::events", step, reason = e.reason.as_deref().unwrap_or(""), "abort");
            }
            EventKind::Done => {
                tracing::info!(target: "aqueue::events", "done");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
