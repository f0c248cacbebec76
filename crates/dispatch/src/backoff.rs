//! Per-item exponential backoff for requeued work.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use herald_core::JobId;

/// Exponential backoff policy with per-job failure tracking.
///
/// Attempt `k` (1-indexed) waits `min(max_delay, base_delay * 2^(k-1))`.
/// The sequence is non-decreasing and capped; there is no retry-count
/// ceiling, only the delay ceiling. Constants are tunable parameters, not
/// load-bearing contracts.
#[derive(Debug)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Duration,
    failures: Mutex<HashMap<JobId, u32>>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(180))
    }
}

impl Backoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Delay for a given attempt number (1-indexed), independent of any
    /// tracked job.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let exp = 2_f64.powi((attempt - 1).min(63) as i32);
        Duration::from_millis((base_ms * exp).min(max_ms) as u64)
    }

    /// Record one more failure for `id` and return the delay before its
    /// next attempt.
    pub fn next_delay(&self, id: JobId) -> Duration {
        let attempt = {
            let mut failures = self.failures.lock().unwrap();
            let count = failures.entry(id).or_insert(0);
            *count += 1;
            *count
        };
        self.delay_for_attempt(attempt)
    }

    /// Number of failures recorded for `id` so far.
    pub fn retries(&self, id: JobId) -> u32 {
        self.failures.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    /// Reset the failure count for `id` (call on success or terminal drop).
    pub fn forget(&self, id: JobId) {
        self.failures.lock().unwrap().remove(&id);
    }
}
