//! `herald-daemon` — process entry wiring for the dispatch engine.
//!
//! The daemon reads env-based options, registers the configured reporters
//! through the dispatch registration boundary, and runs until a shutdown
//! signal (interrupt or configuration change) drains every dispatcher.
//! Real backend reporters live in their own crates and are wired in here;
//! the built-in announce reporter writes job status to the process log.

pub mod announce;
pub mod options;
pub mod watch;
