//! De-duplicating, rate-limited work queue.
//!
//! The queue holds job *identities* only, never payloads, so rapid
//! successive updates to one job collapse into a single downstream delivery
//! of the freshest state. Semantics:
//!
//! - at most one pending entry per id (`add` de-duplicates)
//! - an id handed to a worker is marked *processing*; a concurrent `add`
//!   for it is remembered and re-queued when the worker calls `done`
//! - `add_rate_limited` re-queues after the per-id exponential backoff
//! - `shut_down` stops admitting new work; `get` keeps draining what is
//!   already queued and returns `None` once empty

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use herald_core::JobId;

use crate::backoff::Backoff;

#[derive(Debug, Default)]
struct QueueState {
    order: VecDeque<JobId>,
    /// Ids added but not yet picked up (or re-added while processing).
    dirty: HashSet<JobId>,
    /// Ids currently held by a worker.
    processing: HashSet<JobId>,
    shutting_down: bool,
}

/// An id waiting out its backoff delay.
#[derive(Debug, PartialEq, Eq)]
struct WaitingItem {
    ready_at: Instant,
    id: JobId,
}

// BinaryHeap is a max-heap; order by soonest-ready first.
impl Ord for WaitingItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for WaitingItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct DelayState {
    waiting: BinaryHeap<WaitingItem>,
    shutting_down: bool,
}

/// Work queue for one dispatcher.
///
/// Owned exclusively by its dispatcher; only that dispatcher's own workers
/// consume it. `get` blocks, everything else returns immediately.
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    delay: Mutex<DelayState>,
    delay_changed: Condvar,
    backoff: Backoff,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl WorkQueue {
    /// Create a queue with the default backoff policy.
    pub fn new() -> Arc<Self> {
        Self::with_backoff(Backoff::default())
    }

    /// Create a queue with an explicit backoff policy.
    pub fn with_backoff(backoff: Backoff) -> Arc<Self> {
        let queue = Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
            delay: Mutex::new(DelayState::default()),
            delay_changed: Condvar::new(),
            backoff,
            timer: Mutex::new(None),
        });

        let timer_queue = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name("workqueue-timer".to_string())
            .spawn(move || timer_queue.run_timer())
            .expect("failed to spawn work queue timer thread");
        *queue.timer.lock().unwrap() = Some(handle);

        queue
    }

    /// Insert `id` unless it is already pending. No-op once shutting down.
    pub fn add(&self, id: JobId) {
        let mut state = self.state.lock().unwrap();
        if state.shutting_down {
            return;
        }
        if !state.dirty.insert(id) {
            return;
        }
        if state.processing.contains(&id) {
            // Re-queued by `done` once the in-flight attempt finishes.
            return;
        }
        state.order.push_back(id);
        self.ready.notify_one();
    }

    /// Block until an item is available or the queue has shut down and
    /// drained. The returned id is marked processing until `done`.
    pub fn get(&self) -> Option<JobId> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(id) = state.order.pop_front() {
                state.dirty.remove(&id);
                state.processing.insert(id);
                return Some(id);
            }
            if state.shutting_down {
                return None;
            }
            state = self.ready.wait(state).unwrap();
        }
    }

    /// Clear the processing mark; re-queue the id if it was re-added while
    /// being processed.
    pub fn done(&self, id: JobId) {
        let mut state = self.state.lock().unwrap();
        state.processing.remove(&id);
        if state.dirty.contains(&id) {
            state.order.push_back(id);
            self.ready.notify_one();
        }
    }

    /// Insert `id` once `delay` has elapsed.
    pub fn add_after(&self, id: JobId, delay: Duration) {
        if delay.is_zero() {
            self.add(id);
            return;
        }

        let mut waiting = self.delay.lock().unwrap();
        if waiting.shutting_down {
            return;
        }
        waiting.waiting.push(WaitingItem {
            ready_at: Instant::now() + delay,
            id,
        });
        self.delay_changed.notify_one();
    }

    /// Re-queue `id` after its exponential backoff delay.
    pub fn add_rate_limited(&self, id: JobId) {
        self.add_after(id, self.backoff.next_delay(id));
    }

    /// Reset the backoff counter for `id` (on success or terminal drop).
    pub fn forget(&self, id: JobId) {
        self.backoff.forget(id);
    }

    /// Failures recorded for `id` since it was last forgotten.
    pub fn retries(&self, id: JobId) -> u32 {
        self.backoff.retries(id)
    }

    /// Number of items immediately available to `get`.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().unwrap().shutting_down
    }

    /// Stop admitting new work. Queued items keep draining through `get`;
    /// once the queue empties, `get` returns `None`. In-flight items finish
    /// and may still be re-queued by `done`; items waiting out a backoff
    /// delay are discarded.
    pub fn shut_down(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.shutting_down = true;
            self.ready.notify_all();
        }
        {
            let mut waiting = self.delay.lock().unwrap();
            waiting.shutting_down = true;
            waiting.waiting.clear();
            self.delay_changed.notify_all();
        }
        if let Some(handle) = self.timer.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    fn run_timer(&self) {
        let mut waiting = self.delay.lock().unwrap();
        loop {
            if waiting.shutting_down {
                return;
            }

            let now = Instant::now();
            let next_ready = waiting.waiting.peek().map(|item| item.ready_at);
            match next_ready {
                None => {
                    waiting = self.delay_changed.wait(waiting).unwrap();
                }
                Some(ready_at) if ready_at <= now => {
                    let item = waiting.waiting.pop().unwrap();
                    drop(waiting);
                    self.add(item.id);
                    waiting = self.delay.lock().unwrap();
                }
                Some(ready_at) => {
                    let (guard, _) = self
                        .delay_changed
                        .wait_timeout(waiting, ready_at - now)
                        .unwrap();
                    waiting = guard;
                }
            }
        }
    }
}
