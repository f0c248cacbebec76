//! `herald-events` — the job change feed.
//!
//! Create/update notifications for job records, distributed to the
//! per-reporter dispatchers through a lightweight pub/sub feed.

pub mod event;
pub mod feed;

pub use event::{JobEvent, JobEventKind};
pub use feed::{ChangeFeed, InMemoryChangeFeed, Subscription};
