//! Dispatcher registration and lifecycle.
//!
//! `register_dispatcher` is the boundary the process entry point wires
//! reporters through: it validates configuration, then starts one dispatch
//! thread plus a bounded worker pool against a fresh work queue. Bindings
//! are fixed at startup and immutable for the process lifetime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::info;

use herald_source::JobSource;

use crate::backoff::Backoff;
use crate::dispatcher::{self, DispatchFilter};
use crate::enablement::EnablementChecker;
use crate::error::SetupError;
use crate::queue::WorkQueue;
use crate::reporter::Reporter;
use crate::worker::{WorkerPool, WorkerStatsSnapshot};

/// Startup configuration for one dispatcher.
#[derive(Debug)]
pub struct DispatcherOptions {
    worker_count: usize,
    agent_filter: Option<String>,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl DispatcherOptions {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            agent_filter: None,
            backoff_base: Duration::from_millis(250),
            backoff_max: Duration::from_secs(180),
        }
    }

    /// Only dispatch jobs executed by the given agent kind.
    pub fn with_agent_filter(mut self, agent: impl Into<String>) -> Self {
        self.agent_filter = Some(agent.into());
        self
    }

    /// Override the requeue backoff bounds.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }
}

/// Register a dispatcher with default options.
pub fn register_dispatcher(
    source: Arc<dyn JobSource>,
    reporter: Arc<dyn Reporter>,
    worker_count: usize,
    enablement: Arc<dyn EnablementChecker>,
) -> Result<DispatcherHandle, SetupError> {
    register_dispatcher_with(source, reporter, DispatcherOptions::new(worker_count), enablement)
}

/// Register a dispatcher: validate, subscribe to the change feed, and start
/// the dispatch thread plus `worker_count` report workers.
pub fn register_dispatcher_with(
    source: Arc<dyn JobSource>,
    reporter: Arc<dyn Reporter>,
    options: DispatcherOptions,
    enablement: Arc<dyn EnablementChecker>,
) -> Result<DispatcherHandle, SetupError> {
    if options.worker_count == 0 {
        return Err(SetupError::invalid_worker_count(reporter.name()));
    }

    let name = reporter.name().to_string();
    let queue = WorkQueue::with_backoff(Backoff::new(options.backoff_base, options.backoff_max));
    let subscription = source.watch();
    let stop = Arc::new(AtomicBool::new(false));

    let filter = DispatchFilter::new(
        Arc::clone(&reporter),
        enablement,
        options.agent_filter.clone(),
    );
    let dispatcher = dispatcher::spawn(subscription, filter, Arc::clone(&queue), Arc::clone(&stop));
    let workers = WorkerPool::spawn(options.worker_count, reporter, source, Arc::clone(&queue));

    info!(
        reporter = %name,
        workers = options.worker_count,
        agent_filter = options.agent_filter.as_deref().unwrap_or("<any>"),
        "dispatcher registered"
    );

    Ok(DispatcherHandle {
        reporter_name: name,
        queue,
        stop,
        dispatcher: Some(dispatcher),
        workers: Some(workers),
    })
}

/// Handle to one running dispatcher + worker pool.
pub struct DispatcherHandle {
    reporter_name: String,
    queue: Arc<WorkQueue>,
    stop: Arc<AtomicBool>,
    dispatcher: Option<JoinHandle<()>>,
    workers: Option<WorkerPool>,
}

impl DispatcherHandle {
    pub fn reporter_name(&self) -> &str {
        &self.reporter_name
    }

    /// Delivery counters for this reporter's worker pool.
    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.workers
            .as_ref()
            .map(WorkerPool::stats)
            .unwrap_or_default()
    }

    /// Items currently queued (not yet picked up by a worker).
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Stop admitting events, drain the queue, and join every thread.
    /// Returns the final delivery counters.
    ///
    /// Workers finish their in-flight `report` call; there is no mid-call
    /// cancellation.
    pub fn shutdown(mut self) -> WorkerStatsSnapshot {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
        self.queue.shut_down();
        let stats = self
            .workers
            .take()
            .map(WorkerPool::join)
            .unwrap_or_default();
        info!(reporter = %self.reporter_name, "dispatcher shut down");
        stats
    }
}

/// All dispatchers registered for this process, shut down as one.
#[derive(Default)]
pub struct DispatcherSet {
    handles: Vec<DispatcherHandle>,
}

impl DispatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: DispatcherHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Startup validation: the process needs at least one reporter.
    pub fn ensure_any(&self) -> Result<(), SetupError> {
        if self.is_empty() {
            return Err(SetupError::NoReporters);
        }
        Ok(())
    }

    pub fn stats(&self) -> Vec<(String, WorkerStatsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.reporter_name().to_string(), h.stats()))
            .collect()
    }

    /// Fan one graceful-shutdown signal out to every dispatcher; returns
    /// each reporter's final delivery counters.
    pub fn shutdown_all(self) -> Vec<(String, WorkerStatsSnapshot)> {
        let final_stats = self
            .handles
            .into_iter()
            .map(|handle| {
                let name = handle.reporter_name().to_string();
                (name, handle.shutdown())
            })
            .collect();
        info!("all dispatchers shut down");
        final_stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::JobRecord;
    use herald_source::InMemoryJobSource;

    use crate::enablement::EnableAll;
    use crate::reporter::ReportError;

    struct Quiet;

    impl Reporter for Quiet {
        fn name(&self) -> &str {
            "quiet"
        }

        fn should_report(&self, _record: &JobRecord) -> bool {
            false
        }

        fn report(&self, _record: &JobRecord) -> Result<Option<JobRecord>, ReportError> {
            Ok(None)
        }
    }

    #[test]
    fn zero_workers_is_a_setup_error() {
        let source = Arc::new(InMemoryJobSource::new());
        let result =
            register_dispatcher(source, Arc::new(Quiet), 0, Arc::new(EnableAll));

        assert!(matches!(
            result,
            Err(SetupError::InvalidWorkerCount { .. })
        ));
    }

    #[test]
    fn empty_set_fails_startup_validation() {
        let set = DispatcherSet::new();
        assert!(matches!(set.ensure_any(), Err(SetupError::NoReporters)));
    }

    #[test]
    fn registered_dispatcher_shuts_down_cleanly() {
        let source = Arc::new(InMemoryJobSource::new());
        let handle =
            register_dispatcher(source, Arc::new(Quiet), 2, Arc::new(EnableAll)).unwrap();

        assert_eq!(handle.reporter_name(), "quiet");
        assert_eq!(handle.stats(), WorkerStatsSnapshot::default());

        let mut set = DispatcherSet::new();
        set.register(handle);
        set.ensure_any().unwrap();
        set.shutdown_all();
    }
}
