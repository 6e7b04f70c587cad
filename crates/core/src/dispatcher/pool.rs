//! Semaphore-bounded worker pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::metrics;

use super::queue::CompletionQueue;
use super::types::{Completion, DispatchError, Job, JobOutcome, PoolStatus};

/// Runs jobs with bounded concurrency and reports each completion once.
pub struct Dispatcher {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    completions: CompletionQueue,
}

impl Dispatcher {
    /// Create a dispatcher with `workers` slots (0 = available parallelism).
    pub fn new(workers: usize) -> Self {
        let capacity = if workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            workers
        };
        info!(capacity, "Worker pool ready");

        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            completions: CompletionQueue::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Handle to the queue completions land in.
    pub fn completions(&self) -> CompletionQueue {
        self.completions.clone()
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            capacity: self.capacity,
            busy: self.capacity - self.semaphore.available_permits().min(self.capacity),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }

    /// Stop accepting jobs. Jobs already waiting for a slot complete as
    /// failed; running jobs are unaffected.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Queue a job. Returns immediately; the job waits for a free slot.
    pub fn submit(&self, job: Box<dyn Job>) -> Result<(), DispatchError> {
        if self.semaphore.is_closed() {
            return Err(DispatchError::Closed);
        }

        let broadcaster = job.broadcaster().clone();
        let job_id = job.id();
        let semaphore = Arc::clone(&self.semaphore);
        let in_flight = Arc::clone(&self.in_flight);
        let completions = self.completions.clone();

        in_flight.fetch_add(1, Ordering::SeqCst);
        metrics::JOBS_DISPATCHED.inc();
        debug!(broadcaster = %broadcaster, job_id = %job_id, "Job submitted");

        tokio::spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(permit) => {
                    metrics::WORKERS_BUSY.inc();
                    // Run in its own task so a panic surfaces as a join error.
                    let result = tokio::spawn(async move { job.run().await }).await;
                    metrics::WORKERS_BUSY.dec();
                    drop(permit);

                    match result {
                        Ok(outcome) => outcome,
                        Err(e) if e.is_panic() => {
                            error!(broadcaster = %broadcaster, job_id = %job_id, "Job panicked");
                            JobOutcome::failed("job panicked")
                        }
                        Err(_) => JobOutcome::failed("job cancelled"),
                    }
                }
                Err(_) => JobOutcome::failed("dispatcher closed before the job started"),
            };

            metrics::JOBS_COMPLETED
                .with_label_values(&[outcome.label()])
                .inc();
            debug!(
                broadcaster = %broadcaster,
                job_id = %job_id,
                outcome = outcome.label(),
                "Job completed"
            );
            completions.push(Completion {
                broadcaster,
                job_id,
                outcome,
                finished_at: Utc::now(),
            });
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(())
    }
}
