//! Pending-job queue boundary.
//!
//! The queue is the only owner of jobs that have not been dispatched yet.
//! Implementations must keep strict FIFO order under concurrent callers.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryJobQueue;
pub use r#trait::JobQueue;
