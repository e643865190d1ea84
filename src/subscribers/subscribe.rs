//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging observers into a sequencer. Each
//! subscriber is driven by a dedicated worker loop fed by a bounded queue owned by
//! the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they never block the run loop nor
//!   other subscribers.
//! - Each subscriber declares its queue capacity via [`Subscribe::queue_capacity`].
//!   On overflow, events for that subscriber are **dropped** (warn).
//!
//! ## Example
//! ```rust
//! use aqueue::{Event, EventKind, Subscribe};
//!
//! struct Progress;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Progress {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::Update {
//!             let _pct = ev.progress.unwrap_or_default() * 100.0;
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "progress" }
//! }
//! ```

use crate::events::Event;
use async_trait::async_trait;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
