//! Bounded-concurrency executor for capture jobs.
//!
//! The [`Dispatcher`] runs submitted [`Job`]s on the tokio runtime, at most
//! `capacity` at a time. Every submitted job produces exactly one
//! [`Completion`] in the shared [`CompletionQueue`], whatever its outcome,
//! including a panic. The reconciler drains that queue once per poll cycle.

mod pool;
mod queue;
mod types;

pub use pool::Dispatcher;
pub use queue::CompletionQueue;
pub use types::{Completion, DispatchError, Job, JobFactory, JobOutcome, PoolStatus};
