//! In-memory job state source for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use herald_core::{JobId, JobRecord, JobState};
use herald_events::{ChangeFeed, InMemoryChangeFeed, JobEvent, Subscription};

use crate::{JobSource, SourceError};

/// In-memory source of job records.
///
/// Every `create`/`update`/`transition` publishes a change event, so
/// dispatchers watching this source behave exactly as they would against a
/// real system of record.
#[derive(Debug, Default)]
pub struct InMemoryJobSource {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    feed: InMemoryChangeFeed,
}

impl InMemoryJobSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record and publish a `Created` event.
    pub fn create(&self, record: JobRecord) -> Result<JobId, SourceError> {
        {
            let mut jobs = self.jobs.write().unwrap();
            if jobs.contains_key(&record.id) {
                return Err(SourceError::AlreadyExists(record.id));
            }
            jobs.insert(record.id, record.clone());
        }

        let id = record.id;
        self.feed
            .publish(JobEvent::created(record))
            .map_err(|e| SourceError::Storage(format!("{e:?}")))?;
        Ok(id)
    }

    /// Move a job to a new state and publish an `Updated` event.
    ///
    /// This is how tests (and the daemon's smoke path) simulate the job
    /// execution layer driving the lifecycle.
    pub fn transition(&self, id: JobId, state: JobState) -> Result<(), SourceError> {
        let record = {
            let mut jobs = self.jobs.write().unwrap();
            let record = jobs.get_mut(&id).ok_or(SourceError::NotFound(id))?;
            record.advance(state);
            record.clone()
        };

        self.feed
            .publish(JobEvent::updated(record))
            .map_err(|e| SourceError::Storage(format!("{e:?}")))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().unwrap().is_empty()
    }
}

impl JobSource for InMemoryJobSource {
    fn watch(&self) -> Subscription {
        self.feed.subscribe()
    }

    fn get(&self, id: JobId) -> Result<Option<JobRecord>, SourceError> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    /// Fold the record's reporter bookkeeping into the stored record.
    ///
    /// `state` is owned by the job execution layer and stays as stored, so
    /// a bookkeeping write can never roll back a state transition that
    /// happened while a report was in flight.
    fn update(&self, record: &JobRecord) -> Result<(), SourceError> {
        let merged = {
            let mut jobs = self.jobs.write().unwrap();
            let stored = jobs
                .get_mut(&record.id)
                .ok_or(SourceError::NotFound(record.id))?;
            for (reporter, state) in &record.reported_states {
                stored.reported_states.insert(reporter.clone(), *state);
            }
            stored.updated_at = record.updated_at;
            stored.clone()
        };

        self.feed
            .publish(JobEvent::updated(merged))
            .map_err(|e| SourceError::Storage(format!("{e:?}")))
    }
}
