//! The job record and its reporter bookkeeping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::JobId;
use crate::state::JobState;

/// Where a job came from: the org/repo it was triggered for and the kind of
/// agent executing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub org: String,
    pub repo: String,
    /// Executor kind (e.g. "kubernetes", "jenkins").
    pub agent: String,
}

impl Origin {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            agent: agent.into(),
        }
    }

    /// "org/repo" form used in logs and enablement lookups.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.org, self.repo)
    }
}

/// A CI job as seen by the reporting pipeline.
///
/// `reported_states` is the per-reporter reported-state annotation: for each
/// reporter name, the last job state that reporter successfully delivered.
/// It is what makes redelivery idempotent: a given (job, reporter, state)
/// triple is delivered at most once under normal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Human-readable job name (e.g. "pull-herald-unit-test").
    pub name: String,
    pub state: JobState,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Reporter name -> last state that reporter delivered.
    #[serde(default)]
    pub reported_states: BTreeMap<String, JobState>,
}

impl JobRecord {
    /// Create a new record in the `Pending` state.
    pub fn new(name: impl Into<String>, origin: Origin) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            name: name.into(),
            state: JobState::Pending,
            origin,
            created_at: now,
            updated_at: now,
            reported_states: BTreeMap::new(),
        }
    }

    /// Move the job to a new state.
    pub fn advance(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Whether `reporter` already delivered exactly `state` for this job.
    pub fn already_reported(&self, reporter: &str, state: JobState) -> bool {
        self.reported_states.get(reporter) == Some(&state)
    }

    /// Record that `reporter` delivered `state`.
    pub fn mark_reported(&mut self, reporter: &str, state: JobState) {
        self.reported_states.insert(reporter.to_string(), state);
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
