//! Concurrency-safe completion queue.

use std::sync::{Arc, Mutex, MutexGuard};

use super::types::Completion;

/// Completions pushed by workers and drained by the reconciler.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct CompletionQueue {
    inner: Arc<Mutex<Vec<Completion>>>,
}

impl CompletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // A worker panicking while holding the lock must not lose completions.
    fn lock(&self) -> MutexGuard<'_, Vec<Completion>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, completion: Completion) {
        self.lock().push(completion);
    }

    /// Remove and return every queued completion.
    pub fn drain(&self) -> Vec<Completion> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
