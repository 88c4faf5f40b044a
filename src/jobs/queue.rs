/*!
 * Durable job queue with deduplication keys and a bounded worker pool.
 *
 * The queue owns the job-level retry policy: a failed attempt is re-enqueued
 * with exponential backoff up to the attempt budget, after which the job is
 * parked in a dead set for operator inspection. The adapter layer's retry
 * budget is independent and nested inside a single job attempt.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use super::order_processor::OrderProcessor;
use super::OrderJob;
use crate::errors::ServiceError;

/// Delay before re-attempting a failed job: `2^attempt` seconds.
pub fn job_retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// A job plus its queue bookkeeping.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job: OrderJob,
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time this entry may be handed to a worker
    pub not_before: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues a job. Returns `false` when a job with the same dedup key is
    /// already pending or active (a no-op from the caller's perspective).
    async fn enqueue(&self, job: OrderJob) -> Result<bool, ServiceError>;

    /// Next runnable job, if any. The dedup key stays held until the job is
    /// acked or parked.
    async fn dequeue(&self) -> Option<QueuedJob>;

    /// Successful completion: releases the dedup key.
    async fn ack(&self, job: &QueuedJob);

    /// Failed attempt that may be retried. Returns `true` when the job was
    /// re-enqueued, `false` when the budget is exhausted and the job parked.
    async fn nack(&self, job: &QueuedJob) -> bool;

    /// Terminal failure (no retry benefit): parks the job immediately.
    async fn park(&self, job: &QueuedJob);
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<QueuedJob>,
    held_keys: HashSet<String>,
    dead: Vec<QueuedJob>,
}

/// In-memory queue implementation; the production deployment fronts this
/// with a durable broker carrying the same contract.
pub struct InMemoryJobQueue {
    inner: Mutex<QueueInner>,
    max_attempts: u32,
}

impl InMemoryJobQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Jobs that exhausted their retry budget or failed terminally.
    pub fn dead_jobs(&self) -> Vec<QueuedJob> {
        self.inner.lock().unwrap().dead.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: OrderJob) -> Result<bool, ServiceError> {
        let key = job.dedup_key();
        let mut inner = self.inner.lock().unwrap();
        if inner.held_keys.contains(&key) {
            info!(dedup_key = %key, "Duplicate enqueue ignored");
            return Ok(false);
        }
        inner.held_keys.insert(key);
        inner.pending.push_back(QueuedJob {
            job,
            attempt: 1,
            enqueued_at: Utc::now(),
            not_before: None,
        });
        Ok(true)
    }

    async fn dequeue(&self) -> Option<QueuedJob> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .pending
            .iter()
            .position(|j| j.not_before.map(|t| t <= now).unwrap_or(true))?;
        inner.pending.remove(position)
    }

    async fn ack(&self, job: &QueuedJob) {
        let mut inner = self.inner.lock().unwrap();
        inner.held_keys.remove(&job.job.dedup_key());
    }

    async fn nack(&self, job: &QueuedJob) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if job.attempt >= self.max_attempts {
            warn!(
                order_id = %job.job.order_id,
                attempt = job.attempt,
                "Job retry budget exhausted, parking"
            );
            inner.held_keys.remove(&job.job.dedup_key());
            inner.dead.push(job.clone());
            return false;
        }

        let delay = job_retry_delay(job.attempt);
        inner.pending.push_back(QueuedJob {
            job: job.job.clone(),
            attempt: job.attempt + 1,
            enqueued_at: job.enqueued_at,
            not_before: Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default()),
        });
        true
    }

    async fn park(&self, job: &QueuedJob) {
        let mut inner = self.inner.lock().unwrap();
        inner.held_keys.remove(&job.job.dedup_key());
        inner.dead.push(job.clone());
    }
}

/// Bounded worker pool draining the queue.
///
/// Each job instance is processed to completion by a single worker; the pool
/// only bounds how many jobs are in flight at once.
pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    processor: Arc<OrderProcessor>,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(queue: Arc<dyn JobQueue>, processor: Arc<OrderProcessor>, concurrency: usize) -> Self {
        Self {
            queue,
            processor,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs until the shutdown signal flips to `true` or its sender is
    /// dropped. In-flight jobs run to completion; mid-job cancellation is
    /// deliberately unsupported.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        info!(concurrency = self.concurrency, "Worker pool started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let Some(queued) = self.queue.dequeue().await else {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(100)) => continue,
                    changed = shutdown.changed() => {
                        // a dropped sender means the embedder is gone; treat
                        // it as shutdown rather than spinning on the error
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let processor = self.processor.clone();
            let queue = self.queue.clone();

            tokio::spawn(async move {
                let result = processor.run(&queued.job).await;
                match result {
                    Ok(()) => queue.ack(&queued).await,
                    Err(e) if e.is_retryable() => {
                        warn!(
                            order_id = %queued.job.order_id,
                            attempt = queued.attempt,
                            error = %e,
                            "Job attempt failed, scheduling retry"
                        );
                        queue.nack(&queued).await;
                    }
                    Err(e) => {
                        error!(
                            order_id = %queued.job.order_id,
                            error = %e,
                            "Job failed terminally, parking"
                        );
                        queue.park(&queued).await;
                    }
                }
                drop(permit);
            });
        }

        // wait for in-flight jobs to finish
        let _ = semaphore.acquire_many(self.concurrency as u32).await;
        info!("Worker pool stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn job(order_id: Uuid) -> OrderJob {
        OrderJob {
            order_id,
            order_number: "ORD-77".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_deduplicated() {
        let queue = InMemoryJobQueue::new(3);
        let order_id = Uuid::new_v4();

        assert!(queue.enqueue(job(order_id)).await.unwrap());
        assert!(!queue.enqueue(job(order_id)).await.unwrap());
        assert_eq!(queue.pending_len(), 1);
    }

    #[tokio::test]
    async fn key_released_after_ack_allows_reenqueue() {
        let queue = InMemoryJobQueue::new(3);
        let order_id = Uuid::new_v4();

        queue.enqueue(job(order_id)).await.unwrap();
        let queued = queue.dequeue().await.unwrap();
        // key stays held while the job is active
        assert!(!queue.enqueue(job(order_id)).await.unwrap());

        queue.ack(&queued).await;
        assert!(queue.enqueue(job(order_id)).await.unwrap());
    }

    #[tokio::test]
    async fn nack_requeues_with_incremented_attempt_until_budget() {
        let queue = InMemoryJobQueue::new(2);
        let order_id = Uuid::new_v4();

        queue.enqueue(job(order_id)).await.unwrap();
        let first = queue.dequeue().await.unwrap();
        assert_eq!(first.attempt, 1);
        assert!(queue.nack(&first).await);

        // retried entry is delayed and carries attempt 2
        let retried = {
            let inner = queue.inner.lock().unwrap();
            inner.pending.front().unwrap().clone()
        };
        assert_eq!(retried.attempt, 2);
        assert!(retried.not_before.is_some());

        assert!(!queue.nack(&retried).await);
        assert_eq!(queue.dead_jobs().len(), 1);
        // exhausted job releases its key
        assert!(queue.enqueue(job(order_id)).await.unwrap());
    }

    #[tokio::test]
    async fn delayed_jobs_are_not_dequeued_early() {
        let queue = InMemoryJobQueue::new(3);
        let order_id = Uuid::new_v4();

        queue.enqueue(job(order_id)).await.unwrap();
        let first = queue.dequeue().await.unwrap();
        assert!(queue.nack(&first).await);

        // the retry is scheduled 2s out, so an immediate dequeue sees nothing
        assert!(queue.dequeue().await.is_none());
    }

    #[test]
    fn job_retry_delay_is_exponential() {
        assert_eq!(job_retry_delay(1), Duration::from_secs(2));
        assert_eq!(job_retry_delay(2), Duration::from_secs(4));
        assert_eq!(job_retry_delay(3), Duration::from_secs(8));
    }
}
