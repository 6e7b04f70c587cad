//! Mock job factory for dispatcher and reconciler tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::broadcaster::BroadcasterName;
use crate::dispatcher::{Job, JobFactory, JobOutcome};

/// Creates jobs that finish at once, or that wait to be released.
#[derive(Debug, Clone)]
pub struct MockJobFactory {
    created: Arc<Mutex<Vec<BroadcasterName>>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockJobFactory {
    /// Jobs finish as soon as they run.
    pub fn instant() -> Self {
        Self {
            created: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Jobs block until [`MockJobFactory::release`] lets them through.
    pub fn held() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::instant()
        }
    }

    /// Let `n` held jobs finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Broadcasters a job was created for, in order.
    pub fn created(&self) -> Vec<BroadcasterName> {
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl JobFactory for MockJobFactory {
    fn create(&self, broadcaster: BroadcasterName) -> Box<dyn Job> {
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(broadcaster.clone());
        Box::new(MockJob {
            id: Uuid::new_v4(),
            broadcaster,
            gate: self.gate.clone(),
        })
    }
}

struct MockJob {
    id: Uuid,
    broadcaster: BroadcasterName,
    gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl Job for MockJob {
    fn id(&self) -> Uuid {
        self.id
    }

    fn broadcaster(&self) -> &BroadcasterName {
        &self.broadcaster
    }

    async fn run(self: Box<Self>) -> JobOutcome {
        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return JobOutcome::failed("gate closed"),
            }
        }
        JobOutcome::Done { captured: None }
    }
}
