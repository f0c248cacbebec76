//! Fatal configuration errors.

use thiserror::Error;

/// Error raised while wiring dispatchers at startup.
///
/// These are the only errors allowed to terminate the process; everything
/// that happens after startup is contained within the worker that hit it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Worker count must be at least 1 for a registered reporter.
    #[error("reporter {reporter} configured with zero workers")]
    InvalidWorkerCount { reporter: String },

    /// At least one reporter must be registered for the process to start.
    #[error("no reporters configured")]
    NoReporters,

    /// A credential/token could not be loaded.
    #[error("credential load failed: {0}")]
    Credential(String),
}

impl SetupError {
    pub fn invalid_worker_count(reporter: impl Into<String>) -> Self {
        Self::InvalidWorkerCount {
            reporter: reporter.into(),
        }
    }

    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }
}
