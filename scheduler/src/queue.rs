//! Minimal at-least-once job plane.
//!
//! FIFO per queue over an unbounded channel; workers consume under a
//! concurrency cap. A failed job logs, backs off, and is re-enqueued up to
//! the attempt cap — side-effect idempotence in the pipeline carries the
//! at-least-once correctness burden.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::SchedulerError;
use crate::jobs::Job;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_SECS: u64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job: Job,
    pub attempt: u32,
}

/// Producer handle for one named queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    name: &'static str,
    tx: mpsc::UnboundedSender<QueuedJob>,
}

impl JobQueue {
    pub fn new(name: &'static str) -> (Self, mpsc::UnboundedReceiver<QueuedJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { name, tx }, rx)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn enqueue(&self, job: Job) {
        self.enqueue_attempt(job, 1);
    }

    fn enqueue_attempt(&self, job: Job, attempt: u32) {
        if self
            .tx
            .send(QueuedJob { job, attempt })
            .is_err()
        {
            error!(queue = self.name, "queue: receiver dropped, job lost");
        }
    }
}

/// The queues the core uses.
#[derive(Debug, Clone)]
pub struct QueueSet {
    pub review: JobQueue,
    pub comment_reply: JobQueue,
    pub index: JobQueue,
    pub analytics: JobQueue,
}

impl QueueSet {
    pub fn new() -> (
        Self,
        mpsc::UnboundedReceiver<QueuedJob>,
        mpsc::UnboundedReceiver<QueuedJob>,
        mpsc::UnboundedReceiver<QueuedJob>,
        mpsc::UnboundedReceiver<QueuedJob>,
    ) {
        let (review, review_rx) = JobQueue::new("review");
        let (comment_reply, reply_rx) = JobQueue::new("comment_reply");
        let (index, index_rx) = JobQueue::new("index");
        let (analytics, analytics_rx) = JobQueue::new("analytics");
        (
            Self {
                review,
                comment_reply,
                index,
                analytics,
            },
            review_rx,
            reply_rx,
            index_rx,
            analytics_rx,
        )
    }
}

/// Consume one queue with `concurrency` in-flight jobs.
///
/// The handler is cloned per job; failures re-raise into the retry path.
pub fn spawn_workers<F, Fut>(
    queue: JobQueue,
    mut rx: mpsc::UnboundedReceiver<QueuedJob>,
    concurrency: usize,
    handler: F,
) -> JoinHandle<()>
where
    F: Fn(Job) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SchedulerError>> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    tokio::spawn(async move {
        info!(queue = queue.name(), concurrency, "worker: started");
        while let Some(queued) = rx.recv().await {
            let permit = match sem.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let handler = handler.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                let QueuedJob { job, attempt } = queued;
                let result = handler(job.clone()).await;
                drop(permit);
                if let Err(e) = result {
                    if attempt >= MAX_ATTEMPTS {
                        error!(
                            queue = queue.name(),
                            attempt, "worker: job failed permanently: {e}"
                        );
                        return;
                    }
                    let delay = Duration::from_secs(BACKOFF_BASE_SECS.pow(attempt));
                    warn!(
                        queue = queue.name(),
                        attempt, "worker: job failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    queue.enqueue_attempt(job, attempt + 1);
                }
            });
        }
        info!(queue = queue.name(), "worker: channel closed, stopping");
    })
}
