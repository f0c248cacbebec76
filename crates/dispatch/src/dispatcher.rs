//! Per-reporter dispatch loop.
//!
//! One dispatcher per configured reporter watches the job change feed,
//! decides relevance, and enqueues affected job ids. Enqueue is
//! non-blocking: a slow backend only throttles its own worker pool, never
//! the event stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, trace};

use herald_core::JobRecord;
use herald_events::Subscription;

use crate::enablement::EnablementChecker;
use crate::queue::WorkQueue;
use crate::reporter::Reporter;

/// How often a blocked dispatcher re-checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Relevance decision for one reporter, applied to every change event.
pub(crate) struct DispatchFilter {
    reporter: Arc<dyn Reporter>,
    enablement: Arc<dyn EnablementChecker>,
    agent_filter: Option<String>,
}

impl DispatchFilter {
    pub(crate) fn new(
        reporter: Arc<dyn Reporter>,
        enablement: Arc<dyn EnablementChecker>,
        agent_filter: Option<String>,
    ) -> Self {
        Self {
            reporter,
            enablement,
            agent_filter,
        }
    }

    /// Checks run in order: enablement, agent filter, the reporter's own
    /// predicate, then the idempotent short-circuit on the reported-state
    /// annotation.
    pub(crate) fn wants(&self, record: &JobRecord) -> bool {
        let name = self.reporter.name();

        if !self
            .enablement
            .is_enabled(&record.origin.org, &record.origin.repo, name)
        {
            trace!(reporter = %name, job = %record.id, origin = %record.origin.slug(), "reporter disabled for origin");
            return false;
        }

        if let Some(agent) = &self.agent_filter {
            if &record.origin.agent != agent {
                trace!(reporter = %name, job = %record.id, agent = %record.origin.agent, "agent filtered out");
                return false;
            }
        }

        if !self.reporter.should_report(record) {
            return false;
        }

        if record.already_reported(name, record.state) {
            trace!(reporter = %name, job = %record.id, state = %record.state, "state already reported");
            return false;
        }

        true
    }
}

/// Run the dispatch loop on its own thread until `stop` is set or the feed
/// closes.
pub(crate) fn spawn(
    subscription: Subscription,
    filter: DispatchFilter,
    queue: Arc<WorkQueue>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let name = filter.reporter.name().to_string();

    thread::Builder::new()
        .name(format!("{name}-dispatcher"))
        .spawn(move || {
            info!(reporter = %name, "dispatcher started");

            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                match subscription.recv_timeout(SHUTDOWN_POLL) {
                    Ok(event) => {
                        if filter.wants(&event.record) {
                            debug!(
                                reporter = %name,
                                job = %event.record.id,
                                state = %event.record.state,
                                "queueing job for report"
                            );
                            queue.add(event.job_id());
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        info!(reporter = %name, "change feed closed");
                        break;
                    }
                }
            }

            info!(reporter = %name, "dispatcher stopped");
        })
        .expect("failed to spawn dispatcher thread")
}
