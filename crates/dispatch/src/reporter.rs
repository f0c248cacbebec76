//! The reporter contract.
//!
//! Every backend variant (chat, code review, pub/sub, blob storage, result
//! store, ...) implements the same capability set and is registered
//! explicitly at startup. Reporters are mutually isolated by construction:
//! each gets its own work queue and worker pool, so a persistently failing
//! backend can never slow another reporter's pipeline.

use thiserror::Error;

use herald_core::JobRecord;

/// Delivery failure, classified by the reporter itself.
///
/// Transient failures are requeued with exponential backoff until process
/// shutdown; terminal failures are logged and dropped with no further retry
/// for that (job, reporter, state).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// Retryable: network failure, backend rate limiting, temporary
    /// unavailability.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Non-retryable: malformed payload, permanent backend rejection,
    /// unsupported job type.
    #[error("terminal delivery failure: {0}")]
    Terminal(String),
}

impl ReportError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A backend that delivers job status to one external system.
///
/// `report` performs the side effect. It may return a revised record to
/// persist back to the job state source; reporters should only touch fields
/// they own (the dispatch core layers the reported-state annotation on top
/// of the freshest record at persist time). Dry-run is entirely the
/// reporter's responsibility: suppress the external side effect and return
/// success.
pub trait Reporter: Send + Sync {
    /// Stable identity used for bookkeeping and logs.
    fn name(&self) -> &str;

    /// Backend-specific filter (e.g. act only on terminal states).
    fn should_report(&self, record: &JobRecord) -> bool;

    /// Attempt delivery of the record's current state.
    fn report(&self, record: &JobRecord) -> Result<Option<JobRecord>, ReportError>;
}
