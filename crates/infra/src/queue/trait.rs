use async_trait::async_trait;

use web2wire_core::{Job, PulseRequest};

use crate::error::StoreError;

/// FIFO store of pending jobs.
///
/// Every method is a single atomic operation with respect to other callers:
/// jobs are never lost, duplicated or reordered.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a request at the tail and return it as a sequenced job.
    async fn enqueue(&self, request: PulseRequest) -> Result<Job, StoreError>;

    /// Number of pending jobs.
    async fn size(&self) -> Result<usize, StoreError>;

    /// Take the job at the head. Never waits: returns `None` when empty.
    async fn dequeue(&self) -> Result<Option<Job>, StoreError>;

    /// Put a previously dequeued job back at the head, keeping its sequence id.
    async fn requeue_front(&self, job: Job) -> Result<(), StoreError>;
}
