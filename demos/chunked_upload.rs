//! # Example: chunked_upload
//!
//! Uploads a file in chunks, one step per chunk, with a final commit step.
//!
//! Shows how to:
//! - Queue [`Procedure::future`] steps that report progress with [`Handle::update`].
//! - Retry a flaky step with [`BackoffPolicy`] delays and a retry cap.
//! - Share state between steps through the blackboard.
//! - React to stalls from a `timeout` handler.
//! - Log every event through [`LogWriter`] and `tracing-subscriber`.
//!
//! ## Run
//! ```bash
//! RUST_LOG=aqueue=debug cargo run --example chunked_upload
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use aqueue::{
    BackoffPolicy, Config, EventKind, Handle, JitterPolicy, LogWriter, Procedure, Sequencer,
    Subscribe,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const CHUNKS: u32 = 4;

fn chunk(index: u32, flaky: Arc<AtomicU32>) -> Procedure {
    Procedure::future(format!("chunk-{index}"), move |h: Handle| {
        let flaky = Arc::clone(&flaky);
        async move {
            for part in 1..=4u32 {
                tokio::time::sleep(Duration::from_millis(20)).await;
                h.update(f64::from(part) / 4.0);
            }

            // The second chunk fails twice before the server accepts it.
            if index == 2 && flaky.fetch_add(1, Ordering::SeqCst) < 2 {
                h.retry();
                return;
            }

            h.data().update(|v| {
                let done = v["uploaded"].as_u64().unwrap_or(0);
                v["uploaded"] = json!(done + 1);
            });
            h.complete();
        }
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aqueue=info")),
        )
        .init();

    let mut cfg = Config::default();
    cfg.timeout = Duration::from_millis(500);
    cfg.max_retries = 5;
    cfg.retry_backoff = Some(BackoffPolicy {
        first: Duration::from_millis(50),
        max: Duration::from_millis(400),
        factor: 2.0,
        jitter: JitterPolicy::Equal,
    });

    let seq = Sequencer::builder(cfg)
        .with_subscribers(vec![Arc::new(LogWriter::new()) as Arc<dyn Subscribe>])
        .on(EventKind::Timeout, |ev, h| {
            tracing::warn!(step = h.step(), timeout_ms = ev.timeout_ms, "giving up on stalled chunk");
            h.abort_with("upload stalled");
        })
        .build();
    seq.set_data(json!({ "file": "backup.tar", "uploaded": 0 }));

    let flaky = Arc::new(AtomicU32::new(0));
    let chunks = (1..=CHUNKS).map(|i| chunk(i, Arc::clone(&flaky)));
    let commit = Procedure::callable("commit", |h: Handle| {
        let data = h.get_data();
        if data["uploaded"].as_u64() == Some(u64::from(CHUNKS)) {
            h.complete();
        } else {
            h.abort_with(format!("only {} chunks uploaded", data["uploaded"]));
        }
    });

    match seq.execute(chunks.chain(std::iter::once(commit))).await {
        Ok(report) if report.is_done() => {
            tracing::info!(counts = ?report.counts, data = %seq.get_data(), "upload finished");
        }
        Ok(report) => {
            tracing::error!(reason = report.abort_reason(), "upload aborted");
        }
        Err(e) => tracing::error!(error = %e, "sequencer busy"),
    }

    // Let the LogWriter worker flush its queue.
    tokio::time::sleep(Duration::from_millis(50)).await;
}
