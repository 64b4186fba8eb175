pub mod jobs;
pub mod queue;

pub use jobs::{JobId, JobInfo, JobStatus, ScrapeJob};
pub use queue::{JobQueue, JobRunner, LocalJobQueue, QueueError};
