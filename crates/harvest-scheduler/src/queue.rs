//! Job queue: hand work off now, run it later.
//!
//! Callers get a [`JobId`] immediately and never wait for the work. There is
//! no cancellation; a job runs to completion or fails in place.

use crate::jobs::{JobId, JobInfo, JobStatus, ScrapeJob};
use async_trait::async_trait;
use chrono::Utc;
use harvest_core::{HarvestError, RecordId, ScrapeRequest};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is shut down")]
    Closed,
}

pub type Result<T> = std::result::Result<T, QueueError>;

impl From<QueueError> for HarvestError {
    fn from(err: QueueError) -> Self {
        Self::Queue(err.to_string())
    }
}

/// Executes one deferred scrape and reports the stored record.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, request: ScrapeRequest) -> std::result::Result<RecordId, HarvestError>;
}

/// The job-queue collaborator.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Accept a job and return its id without waiting for it to run.
    async fn enqueue(&self, job: ScrapeJob) -> Result<JobId>;

    /// Current state of a job, if the queue knows it.
    async fn status(&self, id: &JobId) -> Option<JobInfo>;
}

/// Finished jobs kept by default.
pub const DEFAULT_RETAIN_FINISHED: usize = 1000;

/// In-process queue running jobs on the tokio runtime, at most `workers`
/// at a time.
///
/// Only the most recent `retain_finished` completed or failed jobs stay
/// visible to [`JobQueue::status`]. Queued and running jobs are never evicted.
pub struct LocalJobQueue {
    runner: Arc<dyn JobRunner>,
    permits: Arc<Semaphore>,
    jobs: Arc<RwLock<HashMap<JobId, JobInfo>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    retain_finished: usize,
}

impl LocalJobQueue {
    pub fn new(runner: Arc<dyn JobRunner>, workers: usize) -> Self {
        Self {
            runner,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            handles: Mutex::new(Vec::new()),
            retain_finished: DEFAULT_RETAIN_FINISHED,
        }
    }

    /// Keep at most `limit` finished jobs (at least one).
    #[must_use]
    pub fn with_retention(mut self, limit: usize) -> Self {
        self.retain_finished = limit.max(1);
        self
    }

    /// Wait for every job enqueued so far to finish.
    pub async fn wait_idle(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("job task ended abnormally: {}", e);
            }
        }
    }

    /// Stop accepting jobs. Jobs already waiting for a worker fail.
    pub fn close(&self) {
        self.permits.close();
    }

    async fn set_status(
        jobs: &RwLock<HashMap<JobId, JobInfo>>,
        id: &JobId,
        status: JobStatus,
        retain_finished: usize,
    ) {
        let mut jobs = jobs.write().await;
        let finished = status.is_finished();
        if let Some(info) = jobs.get_mut(id) {
            match status {
                JobStatus::Running => info.started_at = Some(Utc::now()),
                JobStatus::Completed { .. } | JobStatus::Failed { .. } => {
                    info.finished_at = Some(Utc::now());
                }
                JobStatus::Queued => {}
            }
            info.status = status;
        }
        if finished {
            evict_finished(&mut jobs, retain_finished);
        }
    }
}

/// Drop the oldest finished jobs until at most `keep` remain.
fn evict_finished(jobs: &mut HashMap<JobId, JobInfo>, keep: usize) {
    let mut finished: Vec<(JobId, _)> = jobs
        .values()
        .filter(|info| info.status.is_finished())
        .map(|info| (info.id.clone(), info.finished_at))
        .collect();
    if finished.len() <= keep {
        return;
    }

    finished.sort_by_key(|(_, at)| *at);
    let excess = finished.len() - keep;
    for (id, _) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
    tracing::debug!(evicted = excess, "evicted finished jobs");
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue(&self, job: ScrapeJob) -> Result<JobId> {
        if self.permits.is_closed() {
            return Err(QueueError::Closed);
        }

        let id = JobId::generate();
        let url = job.request.url_str().to_string();
        self.jobs
            .write()
            .await
            .insert(id.clone(), JobInfo::queued(id.clone(), &url));

        let runner = Arc::clone(&self.runner);
        let permits = Arc::clone(&self.permits);
        let jobs = Arc::clone(&self.jobs);
        let retain = self.retain_finished;
        let job_id = id.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                Self::set_status(
                    &jobs,
                    &job_id,
                    JobStatus::Failed {
                        error: QueueError::Closed.to_string(),
                    },
                    retain,
                )
                .await;
                return;
            };

            Self::set_status(&jobs, &job_id, JobStatus::Running, retain).await;
            tracing::debug!(job_id = %job_id, url = %url, "job started");

            let status = match runner.run(job.request).await {
                Ok(record_id) => {
                    tracing::info!(job_id = %job_id, record_id = %record_id, "job completed");
                    JobStatus::Completed {
                        record_id: record_id.to_string(),
                    }
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, url = %url, "job failed: {}", e);
                    JobStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            Self::set_status(&jobs, &job_id, status, retain).await;
        });

        let mut handles = self.handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        drop(handles);
        tracing::debug!(job_id = %id, "job enqueued");
        Ok(id)
    }

    async fn status(&self, id: &JobId) -> Option<JobInfo> {
        self.jobs.read().await.get(id).cloned()
    }
}
