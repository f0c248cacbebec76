//! Change-feed event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herald_core::{JobId, JobRecord};

/// What happened to the job record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Created,
    Updated,
}

/// A create/update notification for one job record.
///
/// The event carries a snapshot of the record so dispatchers can filter
/// without a lookup. Only the job *identity* ever enters a work queue, so
/// the snapshot is never what gets delivered; workers re-fetch the latest
/// record at processing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub record: JobRecord,
    pub observed_at: DateTime<Utc>,
}

impl JobEvent {
    pub fn created(record: JobRecord) -> Self {
        Self {
            kind: JobEventKind::Created,
            record,
            observed_at: Utc::now(),
        }
    }

    pub fn updated(record: JobRecord) -> Self {
        Self {
            kind: JobEventKind::Updated,
            record,
            observed_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.record.id
    }
}
