//! `herald-core` — job status domain model.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! job identifiers, job states, origin metadata, and the job record with its
//! per-reporter reported-state annotations.

pub mod error;
pub mod id;
pub mod record;
pub mod state;

pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use record::{JobRecord, Origin};
pub use state::JobState;
