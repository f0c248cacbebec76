//! End-to-end dispatch pipeline tests against the in-memory source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use herald_core::{JobId, JobRecord, JobState, Origin};
use herald_dispatch::{
    DispatcherOptions, DispatcherSet, EnableAll, ReportError, Reporter,
    register_dispatcher, register_dispatcher_with,
};
use herald_source::{InMemoryJobSource, JobSource};

fn job(org: &str) -> JobRecord {
    JobRecord::new("integration-test", Origin::new(org, "widgets", "kubernetes"))
}

/// Poll until `check` passes; panic after the deadline.
fn wait_until(what: &str, check: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

/// Records every delivery; optionally restricted to terminal states.
struct RecordingReporter {
    name: &'static str,
    terminal_only: bool,
    reports: Mutex<Vec<(JobId, JobState)>>,
}

impl RecordingReporter {
    fn new(name: &'static str, terminal_only: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            terminal_only,
            reports: Mutex::new(Vec::new()),
        })
    }

    fn reports(&self) -> Vec<(JobId, JobState)> {
        self.reports.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn name(&self) -> &str {
        self.name
    }

    fn should_report(&self, record: &JobRecord) -> bool {
        !self.terminal_only || record.state.is_terminal()
    }

    fn report(&self, record: &JobRecord) -> Result<Option<JobRecord>, ReportError> {
        self.reports.lock().unwrap().push((record.id, record.state));
        Ok(None)
    }
}

/// Fails every attempt with a transient error.
struct AlwaysFailing {
    attempts: AtomicU64,
}

impl Reporter for AlwaysFailing {
    fn name(&self) -> &str {
        "always-failing"
    }

    fn should_report(&self, record: &JobRecord) -> bool {
        record.state.is_terminal()
    }

    fn report(&self, _record: &JobRecord) -> Result<Option<JobRecord>, ReportError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(ReportError::transient("backend unavailable"))
    }
}

/// Fails with transient errors a fixed number of times, then succeeds.
struct Flaky {
    failures: u64,
    attempts: AtomicU64,
}

impl Reporter for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn should_report(&self, record: &JobRecord) -> bool {
        record.state.is_terminal()
    }

    fn report(&self, _record: &JobRecord) -> Result<Option<JobRecord>, ReportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if attempt <= self.failures {
            return Err(ReportError::transient("still warming up"));
        }
        Ok(None)
    }
}

/// Blocks inside `report` until the test releases it.
struct Blocking {
    started: Sender<JobState>,
    release: Mutex<Receiver<()>>,
    reports: Mutex<Vec<JobState>>,
}

impl Reporter for Blocking {
    fn name(&self) -> &str {
        "blocking"
    }

    fn should_report(&self, record: &JobRecord) -> bool {
        record.state.is_started()
    }

    fn report(&self, record: &JobRecord) -> Result<Option<JobRecord>, ReportError> {
        self.started.send(record.state).unwrap();
        self.release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5))
            .expect("test never released the blocked report");
        self.reports.lock().unwrap().push(record.state);
        Ok(None)
    }
}

#[test]
fn delivers_each_state_exactly_once() {
    let source = Arc::new(InMemoryJobSource::new());
    let reporter = RecordingReporter::new("recording", false);
    let handle = register_dispatcher(
        source.clone(),
        reporter.clone(),
        2,
        Arc::new(EnableAll),
    )
    .unwrap();

    let id = source.create(job("acme")).unwrap();
    wait_until("pending delivery", || reporter.reports().len() == 1);

    source.transition(id, JobState::Running).unwrap();
    wait_until("running delivery", || reporter.reports().len() == 2);

    source.transition(id, JobState::Success).unwrap();
    wait_until("success delivery", || reporter.reports().len() == 3);

    // The bookkeeping writes above also hit the change feed; none of them
    // may turn into another delivery.
    std::thread::sleep(Duration::from_millis(100));
    let states: Vec<JobState> = reporter.reports().iter().map(|(_, s)| *s).collect();
    assert_eq!(
        states,
        vec![JobState::Pending, JobState::Running, JobState::Success]
    );

    let record = source.get(id).unwrap().unwrap();
    assert!(record.already_reported("recording", JobState::Success));
    assert_eq!(handle.stats().delivered, 3);

    handle.shutdown();
}

#[test]
fn redundant_updates_are_not_redelivered() {
    let source = Arc::new(InMemoryJobSource::new());
    let reporter = RecordingReporter::new("terminal", true);
    let handle = register_dispatcher(
        source.clone(),
        reporter.clone(),
        1,
        Arc::new(EnableAll),
    )
    .unwrap();

    let id = source.create(job("acme")).unwrap();
    source.transition(id, JobState::Success).unwrap();
    wait_until("success delivery", || reporter.reports().len() == 1);
    wait_until("annotation persisted", || {
        source
            .get(id)
            .unwrap()
            .unwrap()
            .already_reported("terminal", JobState::Success)
    });

    // Same state published again: short-circuited by the annotation.
    let record = source.get(id).unwrap().unwrap();
    source.update(&record).unwrap();

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(reporter.reports().len(), 1);

    handle.shutdown();
}

#[test]
fn failing_reporter_does_not_slow_a_healthy_one() {
    let source = Arc::new(InMemoryJobSource::new());
    let failing = Arc::new(AlwaysFailing {
        attempts: AtomicU64::new(0),
    });
    let healthy = RecordingReporter::new("healthy", true);

    let mut set = DispatcherSet::new();
    set.register(
        register_dispatcher_with(
            source.clone(),
            failing.clone(),
            DispatcherOptions::new(1).with_backoff(
                Duration::from_millis(5),
                Duration::from_millis(20),
            ),
            Arc::new(EnableAll),
        )
        .unwrap(),
    );
    set.register(
        register_dispatcher(source.clone(), healthy.clone(), 2, Arc::new(EnableAll)).unwrap(),
    );
    set.ensure_any().unwrap();

    let ids: Vec<JobId> = (0..5).map(|_| source.create(job("acme")).unwrap()).collect();
    for id in &ids {
        source.transition(*id, JobState::Success).unwrap();
    }

    // The healthy reporter reaches 100% delivery while the other keeps
    // failing every attempt.
    wait_until("healthy deliveries", || healthy.reports().len() == 5);
    wait_until("failing attempts", || {
        failing.attempts.load(Ordering::Relaxed) >= 5
    });

    let delivered: std::collections::HashSet<JobId> =
        healthy.reports().iter().map(|(id, _)| *id).collect();
    assert_eq!(delivered.len(), 5);

    set.shutdown_all();
}

#[test]
fn disabled_origin_never_reaches_the_reporter() {
    let source = Arc::new(InMemoryJobSource::new());
    let reporter = RecordingReporter::new("gated", false);
    let enablement = |org: &str, _repo: &str, _reporter: &str| org != "blocked";
    let handle = register_dispatcher(
        source.clone(),
        reporter.clone(),
        1,
        Arc::new(enablement),
    )
    .unwrap();

    let blocked = source.create(job("blocked")).unwrap();
    let allowed = source.create(job("acme")).unwrap();
    source.transition(blocked, JobState::Success).unwrap();
    source.transition(allowed, JobState::Success).unwrap();

    wait_until("allowed success delivery", || {
        reporter
            .reports()
            .contains(&(allowed, JobState::Success))
    });

    assert!(
        reporter.reports().iter().all(|(id, _)| *id != blocked),
        "blocked org must see zero report calls"
    );

    handle.shutdown();
}

#[test]
fn later_state_supersedes_a_stale_in_flight_report() {
    let source = Arc::new(InMemoryJobSource::new());
    let (started_tx, started_rx) = channel();
    let (release_tx, release_rx) = channel();
    let reporter = Arc::new(Blocking {
        started: started_tx,
        release: Mutex::new(release_rx),
        reports: Mutex::new(Vec::new()),
    });
    let handle = register_dispatcher(
        source.clone(),
        reporter.clone(),
        1,
        Arc::new(EnableAll),
    )
    .unwrap();

    let id = source.create(job("acme")).unwrap();
    source.transition(id, JobState::Running).unwrap();

    // The worker is now mid-report for "running"...
    let in_flight = started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(in_flight, JobState::Running);

    // ...while the job moves on underneath it.
    source.transition(id, JobState::Success).unwrap();
    release_tx.send(()).unwrap();

    // The superseding state is delivered next, and the stale "running"
    // report never overwrites it.
    let next = started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(next, JobState::Success);
    release_tx.send(()).unwrap();

    wait_until("both deliveries recorded", || {
        reporter.reports.lock().unwrap().len() == 2
    });
    wait_until("annotation persisted", || {
        source
            .get(id)
            .unwrap()
            .unwrap()
            .already_reported("blocking", JobState::Success)
    });

    let record = source.get(id).unwrap().unwrap();
    assert_eq!(record.state, JobState::Success);

    handle.shutdown();
}

#[test]
fn transient_failures_retry_until_success() {
    let source = Arc::new(InMemoryJobSource::new());
    let reporter = Arc::new(Flaky {
        failures: 2,
        attempts: AtomicU64::new(0),
    });
    let handle = register_dispatcher_with(
        source.clone(),
        reporter.clone(),
        DispatcherOptions::new(1)
            .with_backoff(Duration::from_millis(5), Duration::from_millis(20)),
        Arc::new(EnableAll),
    )
    .unwrap();

    let id = source.create(job("acme")).unwrap();
    source.transition(id, JobState::Success).unwrap();

    wait_until("delivery after retries", || handle.stats().delivered == 1);
    assert_eq!(reporter.attempts.load(Ordering::Relaxed), 3);
    assert_eq!(handle.stats().requeued, 2);

    handle.shutdown();
}

#[test]
fn terminal_failures_are_dropped_without_retry() {
    struct Rejecting {
        attempts: AtomicU64,
    }

    impl Reporter for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn should_report(&self, record: &JobRecord) -> bool {
            record.state.is_terminal()
        }

        fn report(&self, _record: &JobRecord) -> Result<Option<JobRecord>, ReportError> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Err(ReportError::terminal("unsupported job type"))
        }
    }

    let source = Arc::new(InMemoryJobSource::new());
    let reporter = Arc::new(Rejecting {
        attempts: AtomicU64::new(0),
    });
    let handle = register_dispatcher_with(
        source.clone(),
        reporter.clone(),
        DispatcherOptions::new(1)
            .with_backoff(Duration::from_millis(5), Duration::from_millis(20)),
        Arc::new(EnableAll),
    )
    .unwrap();

    let id = source.create(job("acme")).unwrap();
    source.transition(id, JobState::Success).unwrap();

    wait_until("terminal drop", || handle.stats().dropped == 1);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(reporter.attempts.load(Ordering::Relaxed), 1);
    assert_eq!(handle.stats().delivered, 0);

    handle.shutdown();
}

#[test]
fn shutdown_stops_admitting_events() {
    let source = Arc::new(InMemoryJobSource::new());
    let reporter = RecordingReporter::new("stoppable", false);
    let handle = register_dispatcher(
        source.clone(),
        reporter.clone(),
        2,
        Arc::new(EnableAll),
    )
    .unwrap();

    let id = source.create(job("acme")).unwrap();
    wait_until("pending delivery", || reporter.reports().len() == 1);

    handle.shutdown();

    source.transition(id, JobState::Success).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(reporter.reports().len(), 1);
}
