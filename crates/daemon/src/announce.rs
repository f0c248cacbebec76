//! Built-in reporter that announces job status to the process log.
//!
//! Useful for dev environments and smoke runs: it exercises the whole
//! dispatch pipeline without any external backend.

use tracing::{debug, info};

use herald_core::JobRecord;
use herald_dispatch::{ReportError, Reporter};

pub struct AnnounceReporter {
    dry_run: bool,
}

impl AnnounceReporter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl Reporter for AnnounceReporter {
    fn name(&self) -> &str {
        "announce"
    }

    /// Announce only settled outcomes, not intermediate states.
    fn should_report(&self, record: &JobRecord) -> bool {
        record.state.is_terminal()
    }

    fn report(&self, record: &JobRecord) -> Result<Option<JobRecord>, ReportError> {
        if self.dry_run {
            debug!(
                job = %record.id,
                name = %record.name,
                state = %record.state,
                origin = %record.origin.slug(),
                "dry-run: suppressing announcement"
            );
            return Ok(None);
        }

        info!(
            job = %record.id,
            name = %record.name,
            state = %record.state,
            origin = %record.origin.slug(),
            "job finished"
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{JobState, Origin};

    fn record(state: JobState) -> JobRecord {
        let mut record =
            JobRecord::new("announce-test", Origin::new("acme", "widgets", "kubernetes"));
        record.advance(state);
        record
    }

    #[test]
    fn announces_terminal_states_only() {
        let reporter = AnnounceReporter::new(false);
        assert!(!reporter.should_report(&record(JobState::Pending)));
        assert!(!reporter.should_report(&record(JobState::Running)));
        assert!(reporter.should_report(&record(JobState::Success)));
        assert!(reporter.should_report(&record(JobState::Error)));
    }

    #[test]
    fn report_succeeds_in_both_modes() {
        for dry_run in [false, true] {
            let reporter = AnnounceReporter::new(dry_run);
            assert_eq!(reporter.report(&record(JobState::Success)), Ok(None));
        }
    }
}
