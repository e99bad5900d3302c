use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use web2wire_core::{Job, PulseRequest, SequenceId};

use super::r#trait::JobQueue;
use crate::error::StoreError;

#[derive(Debug, Default)]
struct QueueInner {
    jobs: VecDeque<Job>,
    last_sequence: u64,
}

/// In-process job queue.
///
/// One mutex guards both the jobs and the sequence counter, so sequence ids
/// follow enqueue order exactly. The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    inner: Mutex<QueueInner>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // Every critical section leaves the queue consistent, so a poisoned
        // lock still guards valid data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, request: PulseRequest) -> Result<Job, StoreError> {
        let mut inner = self.lock();
        inner.last_sequence += 1;
        let job = request.into_job(SequenceId::new(inner.last_sequence));
        inner.jobs.push_back(job.clone());
        Ok(job)
    }

    async fn size(&self) -> Result<usize, StoreError> {
        Ok(self.lock().jobs.len())
    }

    async fn dequeue(&self) -> Result<Option<Job>, StoreError> {
        Ok(self.lock().jobs.pop_front())
    }

    async fn requeue_front(&self, job: Job) -> Result<(), StoreError> {
        self.lock().jobs.push_front(job);
        Ok(())
    }
}
