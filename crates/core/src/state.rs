//! Job lifecycle states.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// State of a CI job.
///
/// `Success`, `Failure`, `Aborted` and `Error` are terminal: no further
/// transition occurs once a job reaches one of them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Triggered, waiting for an executor.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with a test/build failure.
    Failure,
    /// Cancelled before completion.
    Aborted,
    /// Infrastructure error, did not run to completion.
    Error,
}

impl JobState {
    /// A terminal state is one from which no further transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Success | JobState::Failure | JobState::Aborted | JobState::Error
        )
    }

    /// Whether the job has started executing (running or terminal).
    pub fn is_started(&self) -> bool {
        !matches!(self, JobState::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Failure => "failure",
            JobState::Aborted => "aborted",
            JobState::Error => "error",
        }
    }
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "success" => Ok(JobState::Success),
            "failure" => Ok(JobState::Failure),
            "aborted" => Ok(JobState::Aborted),
            "error" => Ok(JobState::Error),
            other => Err(DomainError::unknown_state(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Success.is_terminal());
        assert!(JobState::Failure.is_terminal());
        assert!(JobState::Aborted.is_terminal());
        assert!(JobState::Error.is_terminal());
    }

    #[test]
    fn parses_display_names() {
        for state in [
            JobState::Pending,
            JobState::Running,
            JobState::Success,
            JobState::Failure,
            JobState::Aborted,
            JobState::Error,
        ] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!("finished".parse::<JobState>().is_err());
    }
}
