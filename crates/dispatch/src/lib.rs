//! `herald-dispatch` — the status-propagation dispatch engine.
//!
//! Watches job-state changes and reliably delivers them to N independently
//! configured backend reporters, each with its own de-duplicating work
//! queue and bounded worker pool:
//!
//! ```text
//! change feed -> dispatcher filter -> queue -> worker -> reporter
//!                                       ^________________|
//!                                        backoff requeue on
//!                                        transient failure
//! ```
//!
//! Reporters are mutually isolated by construction: a persistently failing
//! backend throttles only its own pool. Per job id, delivery is serialized
//! per reporter; across ids no ordering is guaranteed. Because only
//! identity is queued, a job's later state always supersedes an earlier
//! queued entry for the same id.

pub mod backoff;
pub mod controller;
pub mod dispatcher;
pub mod enablement;
pub mod error;
pub mod queue;
pub mod reporter;
pub mod secret;
pub mod worker;

pub use backoff::Backoff;
pub use controller::{
    DispatcherHandle, DispatcherOptions, DispatcherSet, register_dispatcher,
    register_dispatcher_with,
};
pub use enablement::{EnableAll, EnablementChecker};
pub use error::SetupError;
pub use queue::WorkQueue;
pub use reporter::{ReportError, Reporter};
pub use secret::{FileSecret, SecretProvider, StaticSecret};
pub use worker::{WorkerStats, WorkerStatsSnapshot};
