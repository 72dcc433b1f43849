//! JobQueue trait - queue collaborator contract
//!
//! The distributor never touches storage directly; every status change goes
//! through these operations. Implementations must guarantee that a job is
//! claimed (marked running) by at most one worker at a time.

use crate::{Job, QueueError};

/// Job queue
#[trait_variant::make(JobQueue: Send)]
pub trait LocalJobQueue {
    /// Queue name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Store a new job, returning it with its assigned id
    async fn add_job(&self, job: Job) -> Result<Job, QueueError>;

    /// Mark a freshly created job list as pending
    async fn mark_list_as_pending(&self, jobs: &[Job]) -> Result<(), QueueError>;

    /// Claim a job for execution
    async fn mark_as_running(&self, job: &Job) -> Result<(), QueueError>;

    /// Job finished (dispatched or skipped)
    async fn mark_as_done(&self, job: &Job) -> Result<(), QueueError>;

    /// Job failed; `message` is the original error message
    async fn mark_as_failed(&self, job: &Job, message: &str) -> Result<(), QueueError>;

    /// Up to `limit` pending jobs, oldest first
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Job>, QueueError>;
}
