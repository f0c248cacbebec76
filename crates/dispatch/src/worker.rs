//! Report workers.
//!
//! N workers per dispatcher pull job ids from the work queue, fetch the
//! freshest record, and invoke the reporter. A stuck `report` call stalls at
//! most this reporter's own workers, never another reporter's pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use herald_core::{JobId, JobRecord};
use herald_source::{JobSource, SourceError};

use crate::queue::WorkQueue;
use crate::reporter::{ReportError, Reporter};

/// Delivery counters for one worker pool.
#[derive(Debug, Default)]
pub struct WorkerStats {
    delivered: AtomicU64,
    requeued: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerStatsSnapshot {
    /// Reports that succeeded and were persisted.
    pub delivered: u64,
    /// Transient failures sent back through the rate-limited queue.
    pub requeued: u64,
    /// Terminal failures dropped without retry.
    pub dropped: u64,
    /// Items skipped (filtered out or already reported at processing time).
    pub skipped: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Fixed-size set of report workers for one dispatcher.
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl WorkerPool {
    pub(crate) fn spawn(
        count: usize,
        reporter: Arc<dyn Reporter>,
        source: Arc<dyn JobSource>,
        queue: Arc<WorkQueue>,
    ) -> Self {
        let stats = Arc::new(WorkerStats::default());

        let handles = (0..count)
            .map(|i| {
                let worker = Worker {
                    reporter: Arc::clone(&reporter),
                    source: Arc::clone(&source),
                    queue: Arc::clone(&queue),
                    stats: Arc::clone(&stats),
                };
                thread::Builder::new()
                    .name(format!("{}-worker-{i}", reporter.name()))
                    .spawn(move || worker.run())
                    .expect("failed to spawn report worker thread")
            })
            .collect();

        Self { handles, stats }
    }

    pub(crate) fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait for every worker to drain out after queue shutdown; returns the
    /// final delivery counters.
    pub(crate) fn join(self) -> WorkerStatsSnapshot {
        let Self { handles, stats } = self;
        for handle in handles {
            let _ = handle.join();
        }
        stats.snapshot()
    }
}

struct Worker {
    reporter: Arc<dyn Reporter>,
    source: Arc<dyn JobSource>,
    queue: Arc<WorkQueue>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    fn run(&self) {
        while let Some(id) = self.queue.get() {
            self.process(id);
            self.queue.done(id);
        }
        debug!(reporter = %self.reporter.name(), "report worker exiting");
    }

    fn process(&self, id: JobId) {
        let name = self.reporter.name();

        let record = match self.source.get(id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                // Job deleted since it was queued; nothing left to report.
                self.queue.forget(id);
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(err) => {
                warn!(reporter = %name, job = %id, error = %err, "failed to fetch job record");
                self.stats.requeued.fetch_add(1, Ordering::Relaxed);
                self.queue.add_rate_limited(id);
                return;
            }
        };

        // Re-check at processing time: the record queued earlier may have
        // moved on, and the freshest state is the only one worth delivering.
        if !self.reporter.should_report(&record)
            || record.already_reported(name, record.state)
        {
            self.queue.forget(id);
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let delivered_state = record.state;
        match self.reporter.report(&record) {
            Ok(revised) => match self.persist_reported(id, revised, record) {
                Ok(()) => {
                    info!(
                        reporter = %name,
                        job = %id,
                        state = %delivered_state,
                        "job status delivered"
                    );
                    self.queue.forget(id);
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(SourceError::NotFound(_)) => {
                    self.queue.forget(id);
                    self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!(reporter = %name, job = %id, error = %err, "failed to persist report state");
                    self.stats.requeued.fetch_add(1, Ordering::Relaxed);
                    self.queue.add_rate_limited(id);
                }
            },
            Err(ReportError::Transient(reason)) => {
                warn!(
                    reporter = %name,
                    job = %id,
                    state = %delivered_state,
                    retries = self.queue.retries(id),
                    reason = %reason,
                    "transient delivery failure, requeueing"
                );
                self.stats.requeued.fetch_add(1, Ordering::Relaxed);
                self.queue.add_rate_limited(id);
            }
            Err(ReportError::Terminal(reason)) => {
                error!(
                    reporter = %name,
                    job = %id,
                    state = %delivered_state,
                    reason = %reason,
                    "terminal delivery failure, dropping"
                );
                self.queue.forget(id);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Persist the reported-state annotation for (job, reporter, state).
    ///
    /// The base record is re-fetched so a state transition that happened
    /// mid-report is never overwritten by the stale snapshot that was
    /// delivered; a revision returned by the reporter is persisted with its
    /// `state` refreshed the same way.
    fn persist_reported(
        &self,
        id: JobId,
        revised: Option<JobRecord>,
        delivered: JobRecord,
    ) -> Result<(), SourceError> {
        let delivered_state = delivered.state;
        let latest = self.source.get(id)?;

        let mut record = match (revised, latest) {
            (Some(mut revision), Some(latest)) => {
                revision.state = latest.state;
                revision
            }
            (Some(revision), None) => revision,
            (None, Some(latest)) => latest,
            (None, None) => delivered,
        };

        record.mark_reported(self.reporter.name(), delivered_state);
        self.source.update(&record)
    }
}
