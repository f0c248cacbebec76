//! Change-feed pub/sub mechanics.
//!
//! The feed is the **transport layer** for job change events: the job state
//! source publishes, per-reporter dispatchers subscribe. It is intentionally
//! lightweight and makes minimal assumptions:
//!
//! - **Transport-agnostic**: works with in-memory channels, brokers, etc.
//! - **At-least-once**: an event may be observed more than once; consumers
//!   stay idempotent via the reported-state annotation on the record.
//! - **No persistence**: the feed distributes, the job state source stores.
//!
//! Each subscription gets a copy of every event published after it was
//! created (broadcast semantics). Subscriptions are consumed by a single
//! thread; the usual pattern is `recv_timeout` in a loop so the consumer can
//! also observe a shutdown flag.

use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::sync::{Mutex, mpsc};
use std::time::Duration;

use crate::event::JobEvent;

/// A subscription to the job change feed.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<JobEvent>,
}

impl Subscription {
    pub fn new(receiver: Receiver<JobEvent>) -> Self {
        Self { receiver }
    }

    /// Block until the next event is available.
    pub fn recv(&self) -> Result<JobEvent, RecvError> {
        self.receiver.recv()
    }

    /// Receive without blocking.
    pub fn try_recv(&self) -> Result<JobEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for an event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<JobEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Publish/subscribe access to the job change feed.
pub trait ChangeFeed: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, event: JobEvent) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription;
}

impl<F> ChangeFeed for std::sync::Arc<F>
where
    F: ChangeFeed + ?Sized,
{
    type Error = F::Error;

    fn publish(&self, event: JobEvent) -> Result<(), Self::Error> {
        (**self).publish(event)
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }
}

#[derive(Debug)]
pub enum InMemoryFeedError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

/// In-memory change feed (tests, dev, single-process deployments).
///
/// Best-effort fan-out over std channels; dead subscribers are dropped on
/// the next publish.
#[derive(Debug, Default)]
pub struct InMemoryChangeFeed {
    subscribers: Mutex<Vec<mpsc::Sender<JobEvent>>>,
}

impl InMemoryChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeFeed for InMemoryChangeFeed {
    type Error = InMemoryFeedError;

    fn publish(&self, event: JobEvent) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryFeedError::Poisoned)?;

        subs.retain(|tx| tx.send(event.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();

        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
