//! The poll loop that decides which broadcasters to record.
//!
//! Each cycle runs in a fixed order:
//! - list who is live in the watched category and language
//! - merge the live names into the whitelist and save it
//! - drain finished jobs from the completion queue
//! - start a capture job for each enabled, live broadcaster not already recording
//!
//! The recording set is only touched here, so a broadcaster can never have
//! two jobs in flight.

mod config;
mod runner;
mod types;

pub use config::ReconcilerConfig;
pub use runner::{compute_to_start, Reconciler};
pub use types::{CycleReport, ReconcilerStatus};
