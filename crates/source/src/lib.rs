//! `herald-source` — the job state source boundary.
//!
//! The job state source is the system of record for job records. The
//! dispatch core only ever *reads* current records and *writes back*
//! reporter bookkeeping; actual job execution lives elsewhere.

pub mod memory;

pub use memory::InMemoryJobSource;

use herald_core::{JobId, JobRecord};
use herald_events::Subscription;

/// Job state source error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Read/write access to job records plus a change feed over them.
///
/// Implementations must be safe for concurrent readers: every dispatcher
/// and worker across all reporters shares one source. Updates race only
/// with the job execution layer; within a single reporter, delivery per
/// job id is serialized by the work queue's processing mark.
pub trait JobSource: Send + Sync {
    /// Subscribe to create/update events for job records.
    fn watch(&self) -> Subscription;

    /// Fetch the current record, `None` if it no longer exists.
    fn get(&self, id: JobId) -> Result<Option<JobRecord>, SourceError>;

    /// Persist reporter bookkeeping from `record`.
    ///
    /// The execution layer owns `state`; implementations must not let a
    /// bookkeeping write roll back a state transition that happened after
    /// `record` was fetched.
    fn update(&self, record: &JobRecord) -> Result<(), SourceError>;
}

impl<S> JobSource for std::sync::Arc<S>
where
    S: JobSource + ?Sized,
{
    fn watch(&self) -> Subscription {
        (**self).watch()
    }

    fn get(&self, id: JobId) -> Result<Option<JobRecord>, SourceError> {
        (**self).get(id)
    }

    fn update(&self, record: &JobRecord) -> Result<(), SourceError> {
        (**self).update(record)
    }
}
