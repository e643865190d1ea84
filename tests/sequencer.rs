//! Run-level behavior of the sequencer: ordering, counters, retries, stalls, aborts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aqueue::{
    BackoffPolicy, Config, Counts, Event, EventKind, Handle, Initiate, JitterPolicy,
    Procedure, ProcedureError, RunOutcome, RunState, Sequencer, SequencerError, Subscribe,
    TimeoutPolicy,
};
use serde_json::{Value, json};
use tokio::sync::broadcast;

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn names(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(Event::name).collect()
}

fn completes(name: &'static str) -> Procedure {
    Procedure::callable(name, |h: Handle| h.complete())
}

/// Fails `n` times via `retry()`, then completes.
fn flaky(name: &'static str, n: usize) -> Procedure {
    let tries = Arc::new(AtomicUsize::new(0));
    Procedure::callable(name, move |h: Handle| {
        if tries.fetch_add(1, Ordering::SeqCst) < n {
            h.retry();
        } else {
            h.complete();
        }
    })
}

fn with_timeout(ms: u64) -> Config {
    let mut cfg = Config::default();
    cfg.timeout = Duration::from_millis(ms);
    cfg
}

#[tokio::test]
async fn immediate_completions_fire_one_done() {
    let seq = Sequencer::new(Config::default());
    let mut rx = seq.subscribe();

    let report = seq
        .execute((0..5).map(|_| completes("step")))
        .await
        .expect("idle");

    assert!(report.is_done());
    assert_eq!(
        report.counts,
        Counts {
            queued: 5,
            initiated: 5,
            completed: 5
        }
    );

    let events = drain(&mut rx);
    assert_eq!(events.iter().filter(|e| e.kind == EventKind::Done).count(), 1);
    assert_eq!(events.last().map(|e| e.kind), Some(EventKind::Done));
    assert!(seq.is_empty());
    assert_eq!(seq.state(), RunState::Done);
}

#[tokio::test]
async fn retries_redispatch_the_same_step() {
    let seq = Sequencer::new(Config::default());
    let mut rx = seq.subscribe();

    seq.add(completes("a"));
    seq.add(flaky("b", 2));
    seq.add(completes("c"));
    let report = seq.start().await.expect("idle");

    let events = drain(&mut rx);
    assert_eq!(
        names(&events),
        [
            "initiate", "complete", "initiate", "retry", "initiate", "retry", "initiate",
            "complete", "initiate", "complete", "done"
        ]
    );
    assert_eq!(
        report.counts,
        Counts {
            queued: 3,
            initiated: 5,
            completed: 3
        }
    );

    let b_attempts: Vec<u32> = events
        .iter()
        .filter(|e| e.kind == EventKind::Initiate && e.step.as_deref() == Some("b"))
        .filter_map(|e| e.attempt)
        .collect();
    assert_eq!(b_attempts, [1, 2, 3]);
}

#[tokio::test]
async fn pulse_and_update_leave_counters_alone() {
    let seq = Sequencer::new(Config::default());
    let mut rx = seq.subscribe();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = Arc::clone(&seen);
    let view = seq.clone();
    seq.add(Procedure::callable("a", move |h: Handle| {
        h.pulse();
        h.update(0.5);
        s.lock().unwrap().push((view.len(), view.counts()));
        h.complete();
    }));

    let report = seq.start().await.expect("idle");
    let events = drain(&mut rx);
    assert_eq!(
        names(&events),
        ["initiate", "pulse", "update", "complete", "done"]
    );
    assert_eq!(events[2].progress, Some(0.5));
    assert_eq!(report.counts.initiated, 1);
    assert_eq!(report.counts.completed, 1);
    assert_eq!(
        seen.lock().unwrap()[0],
        (
            1,
            Counts {
                queued: 1,
                initiated: 1,
                completed: 0
            }
        )
    );
}

#[tokio::test]
async fn abort_ends_the_run_and_clears_pending() {
    let seq = Sequencer::new(Config::default());
    let mut rx = seq.subscribe();
    let third_ran = Arc::new(AtomicBool::new(false));

    seq.add(completes("one"));
    seq.add(Procedure::callable("two", |h: Handle| {
        h.abort_with("bad input");
        h.complete();
    }));
    let flag = Arc::clone(&third_ran);
    seq.add(Procedure::callable("three", move |h: Handle| {
        flag.store(true, Ordering::SeqCst);
        h.complete();
    }));

    let report = seq.start().await.expect("idle");

    assert_eq!(
        report.outcome,
        RunOutcome::Aborted {
            reason: Arc::from("bad input"),
            abandoned: vec!["two".to_string(), "three".to_string()],
        }
    );
    assert_eq!(report.counts.completed, 1);
    assert!(!third_ran.load(Ordering::SeqCst));
    assert!(seq.is_empty());
    assert_eq!(seq.state(), RunState::Aborted);

    let events = drain(&mut rx);
    assert_eq!(names(&events), ["initiate", "complete", "initiate", "abort"]);
    assert_eq!(events[3].step.as_deref(), Some("two"));
}

#[tokio::test]
async fn shared_data_flows_between_steps() {
    let seq = Sequencer::new(Config::default());
    let read = Arc::new(Mutex::new(Value::Null));

    seq.add(Procedure::callable("write", |h: Handle| {
        h.set_data("x");
        assert_eq!(h.get_data(), json!("x"));
        h.complete();
    }));
    let r = Arc::clone(&read);
    seq.add(Procedure::callable("read", move |h: Handle| {
        *r.lock().unwrap() = h.get_data();
        h.complete();
    }));

    seq.start().await.expect("idle");
    assert_eq!(*read.lock().unwrap(), json!("x"));
    assert_eq!(seq.get_data(), json!("x"));
}

#[tokio::test(start_paused = true)]
async fn stalled_step_reports_one_timeout_and_waits() {
    let seq = Sequencer::new(with_timeout(50));
    let mut rx = seq.subscribe();
    seq.add(Procedure::callable("hang", |_h: Handle| {}));

    let runner = {
        let seq = seq.clone();
        tokio::spawn(async move { seq.start().await })
    };

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(names(&drain(&mut rx)), ["initiate"]);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let events = drain(&mut rx);
    assert_eq!(names(&events), ["timeout"]);
    assert_eq!(events[0].timeout_ms, Some(50));
    assert_eq!(seq.state(), RunState::Stalled);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(drain(&mut rx).is_empty(), "timeout fires once, no auto-advance");
    assert_eq!(seq.len(), 1);

    assert!(seq.abort());
    let report = runner.await.expect("join").expect("run");
    assert_eq!(report.abort_reason(), Some("aborted by application"));
    assert_eq!(names(&drain(&mut rx)), ["abort"]);
    assert!(!seq.abort(), "nothing left to abort");
}

#[tokio::test(start_paused = true)]
async fn timeout_handler_may_complete_the_step() {
    let seq = Sequencer::builder(with_timeout(50))
        .on(EventKind::Timeout, |_ev, h| h.complete())
        .build();
    let mut rx = seq.subscribe();
    seq.add(Procedure::callable("hang", |_h: Handle| {}));

    let report = seq.start().await.expect("idle");
    assert!(report.is_done());
    assert_eq!(
        names(&drain(&mut rx)),
        ["initiate", "timeout", "complete", "done"]
    );
}

#[tokio::test(start_paused = true)]
async fn abort_policy_turns_a_stall_into_an_abort() {
    let mut cfg = with_timeout(50);
    cfg.timeout_policy = TimeoutPolicy::Abort;
    let seq = Sequencer::new(cfg);
    let mut rx = seq.subscribe();

    let kept = Arc::new(Mutex::new(None::<Handle>));
    let k = Arc::clone(&kept);
    seq.add(Procedure::callable("hang", move |h: Handle| {
        *k.lock().unwrap() = Some(h);
    }));
    seq.add(completes("never"));

    let report = seq.start().await.expect("idle");
    assert!(report.abort_reason().unwrap_or_default().contains("timed out"));
    assert_eq!(names(&drain(&mut rx)), ["initiate", "timeout", "abort"]);

    let handle = kept.lock().unwrap().take().expect("dispatched");
    assert!(handle.is_cancelled(), "abort cancels the active step");
}

#[tokio::test]
async fn resolving_a_step_cancels_its_token() {
    let seq = Sequencer::new(Config::default());
    // (handle, cancelled at dispatch, previous dispatch cancelled at dispatch)
    let seen = Arc::new(Mutex::new(Vec::<(Handle, bool, Option<bool>)>::new()));

    let s = Arc::clone(&seen);
    seq.add(Procedure::callable("flaky", move |h: Handle| {
        let first = {
            let mut seen = s.lock().unwrap();
            let prev = seen.last().map(|(p, _, _)| p.is_cancelled());
            seen.push((h.clone(), h.is_cancelled(), prev));
            seen.len() == 1
        };
        if first {
            h.retry();
        } else {
            h.complete();
        }
    }));

    let report = seq.start().await.expect("idle");
    assert!(report.is_done());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(!seen[0].1 && !seen[1].1, "each dispatch gets a live token");
    assert_eq!(seen[1].2, Some(true), "retry cancels the previous token");
    assert!(seen[1].0.is_cancelled(), "complete cancels the token");
}

#[tokio::test(start_paused = true)]
async fn aborting_drops_an_in_flight_future_step() {
    let seq = Sequencer::new(with_timeout(0));
    let ran = Arc::new(AtomicBool::new(false));

    let r = Arc::clone(&ran);
    seq.add(Procedure::future("slow", move |h: Handle| {
        let ran = Arc::clone(&r);
        async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            ran.store(true, Ordering::SeqCst);
            h.complete();
        }
    }));

    let runner = {
        let seq = seq.clone();
        tokio::spawn(async move { seq.start().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(seq.abort());

    let report = runner.await.expect("join").expect("run");
    assert_eq!(report.abort_reason(), Some("aborted by application"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn pulses_keep_a_slow_step_alive() {
    let seq = Sequencer::new(with_timeout(50));
    let mut rx = seq.subscribe();

    seq.add(Procedure::future("stream", |h: Handle| async move {
        for i in 1..=5 {
            tokio::time::sleep(Duration::from_millis(30)).await;
            h.update(f64::from(i) / 5.0);
        }
        h.complete();
    }));

    let report = seq.start().await.expect("idle");
    assert!(report.is_done());

    let events = drain(&mut rx);
    assert!(events.iter().all(|e| e.kind != EventKind::Timeout));
    let progress: Vec<f64> = events.iter().filter_map(|e| e.progress).collect();
    assert_eq!(progress, [0.2, 0.4, 0.6, 0.8, 1.0]);
}

#[tokio::test(start_paused = true)]
async fn pulse_revives_a_stalled_step() {
    let seq = Sequencer::new(with_timeout(50));
    let mut rx = seq.subscribe();

    seq.add(Procedure::future("slow", |h: Handle| async move {
        tokio::time::sleep(Duration::from_millis(80)).await;
        h.pulse();
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.complete();
    }));

    let report = seq.start().await.expect("idle");
    assert!(report.is_done());
    assert_eq!(
        names(&drain(&mut rx)),
        ["initiate", "timeout", "pulse", "complete", "done"]
    );
}

#[tokio::test(start_paused = true)]
async fn start_while_running_is_rejected() {
    let seq = Sequencer::new(with_timeout(0));
    seq.add(Procedure::callable("hang", |_h: Handle| {}));

    let runner = {
        let seq = seq.clone();
        tokio::spawn(async move { seq.start().await })
    };
    while !seq.state().is_active() {
        tokio::task::yield_now().await;
    }

    assert_eq!(
        seq.start().await.unwrap_err(),
        SequencerError::AlreadyRunning
    );
    assert!(seq.abort());
    assert!(!runner.await.expect("join").expect("run").is_done());
}

#[tokio::test]
async fn restart_resumes_instead_of_replaying() {
    let seq = Sequencer::new(Config::default());
    let a_runs = Arc::new(AtomicUsize::new(0));

    let a = Arc::clone(&a_runs);
    seq.add(Procedure::callable("a", move |h: Handle| {
        a.fetch_add(1, Ordering::SeqCst);
        h.complete();
    }));
    seq.start().await.expect("idle");

    seq.add(completes("b"));
    let mut rx = seq.subscribe();
    let report = seq.start().await.expect("idle");

    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        report.counts,
        Counts {
            queued: 1,
            initiated: 1,
            completed: 1
        }
    );
    let steps: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| e.step.map(|s| s.to_string()))
        .collect();
    assert_eq!(steps, ["b", "b"]);
}

#[tokio::test(start_paused = true)]
async fn dropped_run_releases_the_sequencer() {
    let seq = Sequencer::new(with_timeout(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&calls);
    seq.add(Procedure::callable("flaky", move |h: Handle| {
        // first dispatch never resolves
        if c.fetch_add(1, Ordering::SeqCst) > 0 {
            h.complete();
        }
    }));

    let first = tokio::time::timeout(Duration::from_millis(100), seq.start()).await;
    assert!(first.is_err());
    assert_eq!(seq.state(), RunState::Aborted);
    assert_eq!(seq.pending_names(), ["flaky"]);

    let report = seq.start().await.expect("released");
    assert!(report.is_done());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retry_limit_aborts_the_run() {
    let mut cfg = Config::default();
    cfg.max_retries = 2;
    let seq = Sequencer::new(cfg);
    let mut rx = seq.subscribe();
    seq.add(Procedure::callable("stubborn", |h: Handle| h.retry()));

    let report = seq.start().await.expect("idle");
    assert!(
        report
            .abort_reason()
            .unwrap_or_default()
            .starts_with("retry limit exceeded")
    );
    assert_eq!(
        names(&drain(&mut rx)),
        ["initiate", "retry", "initiate", "retry", "initiate", "abort"]
    );
    assert_eq!(report.counts.initiated, 3);
}

#[tokio::test(start_paused = true)]
async fn retry_backoff_delays_redispatch() {
    let mut cfg = with_timeout(0);
    cfg.retry_backoff = Some(BackoffPolicy {
        first: Duration::from_millis(100),
        max: Duration::from_secs(1),
        factor: 2.0,
        jitter: JitterPolicy::None,
    });
    let seq = Sequencer::new(cfg);
    let mut rx = seq.subscribe();
    seq.add(flaky("net", 2));

    let started = tokio::time::Instant::now();
    let report = seq.start().await.expect("idle");
    assert!(report.is_done());
    assert!(started.elapsed() >= Duration::from_millis(300));

    let delays: Vec<u32> = drain(&mut rx)
        .iter()
        .filter(|e| e.kind == EventKind::Retry)
        .filter_map(|e| e.delay_ms)
        .collect();
    assert_eq!(delays, [100, 200]);
}

#[tokio::test(start_paused = true)]
async fn abort_during_backoff_wait_skips_redispatch() {
    let mut cfg = with_timeout(0);
    cfg.retry_backoff = Some(BackoffPolicy {
        first: Duration::from_secs(10),
        max: Duration::from_secs(10),
        factor: 1.0,
        jitter: JitterPolicy::None,
    });
    let seq = Sequencer::new(cfg);
    let mut rx = seq.subscribe();
    let dispatches = Arc::new(AtomicUsize::new(0));

    let d = Arc::clone(&dispatches);
    seq.add(Procedure::callable("r", move |h: Handle| {
        d.fetch_add(1, Ordering::SeqCst);
        h.retry();
    }));

    let runner = {
        let seq = seq.clone();
        tokio::spawn(async move { seq.start().await })
    };
    while seq.state() != RunState::Retrying {
        tokio::task::yield_now().await;
    }
    assert!(seq.abort());

    let report = runner.await.expect("join").expect("run");
    assert_eq!(
        report.outcome,
        RunOutcome::Aborted {
            reason: Arc::from("aborted by application"),
            abandoned: vec!["r".to_string()],
        }
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(names(&drain(&mut rx)), ["initiate", "retry", "abort"]);
    assert_eq!(dispatches.load(Ordering::SeqCst), 1);
    assert_eq!(seq.state(), RunState::Aborted);
}

#[tokio::test(start_paused = true)]
async fn decorrelated_backoff_stays_in_its_window_per_retry() {
    let first = Duration::from_millis(100);
    let mut cfg = with_timeout(0);
    cfg.retry_backoff = Some(BackoffPolicy {
        first,
        max: Duration::from_secs(2),
        factor: 2.0,
        jitter: JitterPolicy::Decorrelated,
    });
    let seq = Sequencer::new(cfg);
    let mut rx = seq.subscribe();
    seq.add(flaky("net", 4));

    let report = seq.start().await.expect("idle");
    assert!(report.is_done());

    let delays: Vec<u32> = drain(&mut rx)
        .iter()
        .filter(|e| e.kind == EventKind::Retry)
        .filter_map(|e| e.delay_ms)
        .collect();
    assert_eq!(delays.len(), 4);
    for (n, delay) in delays.into_iter().enumerate() {
        // base for retry n is 100ms × 2^n; the window is [first, min(3 × base, max)]
        let upper = (300u32 << n).min(2_000);
        assert!((100..=upper).contains(&delay), "retry {n}: {delay}ms");
    }
}

#[tokio::test]
async fn signals_from_resolved_dispatches_are_ignored() {
    let seq = Sequencer::new(Config::default());
    let mut rx = seq.subscribe();

    seq.add(Procedure::callable("twice", |h: Handle| {
        h.complete();
        h.complete();
        h.retry();
    }));
    seq.add(completes("next"));
    seq.add(completes("last"));

    let report = seq.start().await.expect("idle");
    assert_eq!(report.counts.completed, 3);
    assert_eq!(
        names(&drain(&mut rx)),
        [
            "initiate", "complete", "initiate", "complete", "initiate", "complete", "done"
        ]
    );
}

struct Misconfigured;

impl Initiate for Misconfigured {
    fn name(&self) -> &str {
        "misconfigured"
    }

    fn initiate(&self, _handle: Handle) -> Result<(), ProcedureError> {
        Err(ProcedureError::fatal(self.name(), "missing endpoint"))
    }
}

#[tokio::test]
async fn dispatch_failures_abort_the_run() {
    let seq = Sequencer::new(Config::default());
    let mut rx = seq.subscribe();
    seq.add(Procedure::capability(Misconfigured));
    seq.add(completes("after"));

    let report = seq.start().await.expect("idle");
    let reason = report.abort_reason().unwrap_or_default().to_string();
    assert!(reason.contains("misconfigured") && reason.contains("missing endpoint"));
    assert_eq!(names(&drain(&mut rx)), ["initiate", "abort"]);

    seq.add(Procedure::callable("explodes", |_h: Handle| panic!("bad wiring")));
    let report = seq.start().await.expect("idle");
    assert!(report.abort_reason().unwrap_or_default().contains("bad wiring"));
}

#[tokio::test]
async fn empty_queue_is_done_immediately() {
    let seq = Sequencer::new(Config::default());
    let mut rx = seq.subscribe();

    let report = seq.start().await.expect("idle");
    assert!(report.is_done());
    assert_eq!(report.counts, Counts::default());
    assert_eq!(names(&drain(&mut rx)), ["done"]);
}

#[tokio::test]
async fn handlers_route_by_name_with_fallback() {
    let named = Arc::new(Mutex::new(Vec::new()));
    let other = Arc::new(Mutex::new(Vec::new()));

    let n = Arc::clone(&named);
    let seq = Sequencer::builder(Config::default())
        .on(EventKind::Complete, move |ev, h| {
            n.lock()
                .unwrap()
                .push(format!("{}:{}", ev.name(), h.step()));
        })
        .build();
    let o = Arc::clone(&other);
    seq.on_other(move |name, _ev, _h| o.lock().unwrap().push(name.to_string()));

    seq.execute([completes("a"), completes("b")])
        .await
        .expect("idle");

    assert_eq!(*named.lock().unwrap(), ["complete:a", "complete:b"]);
    assert_eq!(*other.lock().unwrap(), ["initiate", "initiate", "done"]);

    assert!(seq.off(EventKind::Complete));
    seq.execute([completes("c")]).await.expect("idle");
    assert_eq!(
        *other.lock().unwrap(),
        ["initiate", "initiate", "done", "initiate", "complete", "done"]
    );
}

struct Recorder(Arc<Mutex<Vec<EventKind>>>);

#[async_trait::async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.0.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn subscribers_observe_every_run_event() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Recorder(Arc::clone(&seen)))];
    #[cfg(feature = "logging")]
    subs.push(Arc::new(aqueue::LogWriter::new()));

    let seq = Sequencer::builder(Config::default())
        .with_subscribers(subs)
        .with_procedure(flaky("a", 1))
        .with_procedure(Procedure::callable("b", |h: Handle| {
            h.update(0.5);
            h.complete();
        }))
        .build();

    let report = seq.start().await.expect("idle");
    assert!(report.is_done());

    let delivered = tokio::time::timeout(Duration::from_secs(1), async {
        while !seen.lock().unwrap().contains(&EventKind::Done) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(delivered.is_ok(), "subscriber never saw done");

    assert_eq!(
        *seen.lock().unwrap(),
        [
            EventKind::Initiate,
            EventKind::Retry,
            EventKind::Initiate,
            EventKind::Complete,
            EventKind::Initiate,
            EventKind::Update,
            EventKind::Complete,
            EventKind::Done,
        ]
    );
}
