//! # Example: custom_subscriber
//!
//! Attaches a custom [`Subscribe`] implementation that tallies run events.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for step metrics.
//! - Wire the subscriber in through [`Sequencer::builder`].
//!
//! ## Flow
//! ```text
//! Sequencer::start()
//!     └─► Run::emit(ev)
//!           ├─► EventDispatcher (inline handlers)
//!           └─► SubscriberSet::emit ──► [queue] ──► Tally::on_event()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aqueue::{Config, Event, EventKind, Handle, Procedure, Sequencer, Subscribe};

/// Counts events per kind and prints the interesting ones.
/// A real subscriber would export metrics or ship logs instead.
#[derive(Default)]
struct Tally {
    seen: Mutex<HashMap<EventKind, usize>>,
}

#[async_trait::async_trait]
impl Subscribe for Tally {
    async fn on_event(&self, ev: &Event) {
        if let Ok(mut seen) = self.seen.lock() {
            *seen.entry(ev.kind).or_default() += 1;
        }

        let step = ev.step.as_deref().unwrap_or("-");
        match ev.kind {
            EventKind::Initiate => {
                println!("[sub] initiate: step={step} attempt={}", ev.attempt.unwrap_or(0));
            }
            EventKind::Retry => {
                let delay = ev.delay_ms.map(|v| format!("{v}ms")).unwrap_or_default();
                println!("[sub] retry:    step={step} delay={delay}");
            }
            EventKind::Update => {
                let pct = ev.progress.unwrap_or_default() * 100.0;
                println!("[sub] update:   step={step} {pct:.0}%");
            }
            EventKind::Timeout => {
                println!(
                    "[sub] timeout:  step={step} after={}ms",
                    ev.timeout_ms.unwrap_or(0)
                );
            }
            EventKind::Abort => {
                println!(
                    "[sub] abort:    step={step} reason={}",
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }
            EventKind::Done => println!("[sub] done"),
            EventKind::Complete | EventKind::Pulse => {}
        }
    }

    fn name(&self) -> &'static str {
        "tally"
    }

    fn queue_capacity(&self) -> usize {
        64
    }
}

#[tokio::main]
async fn main() {
    let tally = Arc::new(Tally::default());

    let mut cfg = Config::default();
    cfg.timeout = Duration::from_millis(200);

    let seq = Sequencer::builder(cfg)
        .with_subscribers(vec![Arc::clone(&tally) as Arc<dyn Subscribe>])
        .build();

    let attempts = Arc::new(Mutex::new(0u32));
    let a = Arc::clone(&attempts);
    seq.add(Procedure::callable("handshake", move |h: Handle| {
        let mut n = a.lock().unwrap_or_else(|e| e.into_inner());
        *n += 1;
        if *n < 3 { h.retry() } else { h.complete() }
    }));
    seq.add(Procedure::future("download", |h: Handle| async move {
        for i in 1..=4 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.update(f64::from(i) / 4.0);
        }
        h.complete();
    }));

    let report = match seq.start().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("cannot start: {e}");
            return;
        }
    };

    // Subscribers drain asynchronously; give the worker a moment to catch up.
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("outcome: {:?}", report.outcome);
    println!("counts:  {:?}", report.counts);
    if let Ok(seen) = tally.seen.lock() {
        let mut rows: Vec<_> = seen.iter().collect();
        rows.sort_by_key(|(kind, _)| kind.as_str());
        for (kind, n) in rows {
            println!("  {kind:<9} {n}");
        }
    }
}
