//! In-memory job queue with batched, bounded-concurrency draining
//!
//! The drain loop is single-threaded at the tick level: one batch in flight
//! at a time, fanned out in chunks of at most `max_concurrent_jobs`. Retry
//! backoff never sleeps under the queue lock; failed jobs re-enter the queue
//! via a spawned delayed task.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::{backoff_delay, Job, JobEnvelope};
use crate::Result;

/// Executes one job; the seam between the queue and storage
pub trait ExecuteJob: Send + Sync + 'static {
    /// Run the job to completion
    ///
    /// # Errors
    ///
    /// Returns error on any handler failure; the queue schedules the retry.
    fn execute(&self, job: &Job) -> Result<()>;
}

/// Queue tuning
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Drain tick interval
    pub processing_interval: Duration,
    /// Jobs drained per tick
    pub batch_size: usize,
    /// Jobs running concurrently within a batch
    pub max_concurrent_jobs: usize,
    /// Retries before a job is dropped
    pub max_retries: u32,
    /// Execution time above this logs a slow-job warning
    pub slow_job_threshold: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            processing_interval: Duration::from_millis(50),
            batch_size: 50,
            max_concurrent_jobs: 10,
            max_retries: 3,
            slow_job_threshold: Duration::from_millis(1000),
        }
    }
}

/// Queue observability snapshot
#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub processing: bool,
    pub batch_size: usize,
    pub processing_interval_ms: u64,
    pub max_concurrent_jobs: usize,
    pub retry_queue_size: usize,
    pub job_type_counts: HashMap<&'static str, usize>,
}

struct QueueInner {
    pending: Mutex<VecDeque<JobEnvelope>>,
    retry_pending: AtomicUsize,
    processing: AtomicBool,
    config: QueueConfig,
    executor: Arc<dyn ExecuteJob>,
}

/// Handle to the in-memory background job queue
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    /// Create a queue over an executor
    #[must_use]
    pub fn new(executor: Arc<dyn ExecuteJob>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(VecDeque::new()),
                retry_pending: AtomicUsize::new(0),
                processing: AtomicBool::new(false),
                config,
                executor,
            }),
        }
    }

    /// Append a job; returns immediately, never blocks, never fails
    pub fn enqueue(&self, job: Job) {
        let envelope = JobEnvelope::new(job);
        tracing::debug!(job = envelope.job.kind(), id = %envelope.id, "job enqueued");
        self.inner
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(envelope);
    }

    /// Pending job count
    pub fn len(&self) -> usize {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether no jobs are pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a batch is currently in flight
    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::Relaxed)
    }

    /// Jobs waiting out a retry backoff
    pub fn retry_queue_size(&self) -> usize {
        self.inner.retry_pending.load(Ordering::Relaxed)
    }

    /// Observability snapshot
    pub fn status(&self) -> QueueStatus {
        let pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut job_type_counts: HashMap<&'static str, usize> = HashMap::new();
        for envelope in pending.iter() {
            *job_type_counts.entry(envelope.job.kind()).or_default() += 1;
        }

        QueueStatus {
            queue_length: pending.len(),
            processing: self.inner.processing.load(Ordering::Relaxed),
            batch_size: self.inner.config.batch_size,
            processing_interval_ms: u64::try_from(
                self.inner.config.processing_interval.as_millis(),
            )
            .unwrap_or(u64::MAX),
            max_concurrent_jobs: self.inner.config.max_concurrent_jobs,
            retry_queue_size: self.inner.retry_pending.load(Ordering::Relaxed),
            job_type_counts,
        }
    }

    /// Spawn the recurring drain loop
    pub fn spawn_drain_loop(&self) -> tokio::task::JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.processing_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                Self::drain_once(&inner).await;
            }
        })
    }

    /// Drain and execute one batch; exposed for tests
    pub async fn drain_now(&self) {
        Self::drain_once(&self.inner).await;
    }

    async fn drain_once(inner: &Arc<QueueInner>) {
        let batch: Vec<JobEnvelope> = {
            let mut pending = inner
                .pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let take = pending.len().min(inner.config.batch_size);
            pending.drain(..take).collect()
        };

        if batch.is_empty() {
            return;
        }

        inner.processing.store(true, Ordering::Relaxed);

        for chunk in batch.chunks(inner.config.max_concurrent_jobs.max(1)) {
            let handles: Vec<_> = chunk
                .iter()
                .cloned()
                .map(|envelope| {
                    let inner = inner.clone();
                    tokio::spawn(async move {
                        Self::run_job(&inner, envelope).await;
                    })
                })
                .collect();

            // Settle the whole chunk before the next one starts; individual
            // failures are already handled inside run_job
            for result in futures::future::join_all(handles).await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "job task panicked");
                }
            }
        }

        inner.processing.store(false, Ordering::Relaxed);
    }

    async fn run_job(inner: &Arc<QueueInner>, envelope: JobEnvelope) {
        let executor = inner.executor.clone();
        let job = envelope.job.clone();
        let started = Instant::now();

        let outcome =
            tokio::task::spawn_blocking(move || executor.execute(&job)).await;

        let elapsed = started.elapsed();
        if elapsed > inner.config.slow_job_threshold {
            tracing::warn!(
                job = envelope.job.kind(),
                id = %envelope.id,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "slow job"
            );
        }

        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("job task failed: {e}"),
        };

        if envelope.retry_count < inner.config.max_retries {
            let delay = backoff_delay(envelope.retry_count);
            tracing::warn!(
                job = envelope.job.kind(),
                id = %envelope.id,
                retry = envelope.retry_count + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "job failed, scheduling retry"
            );

            let mut retry = envelope;
            retry.retry_count += 1;
            inner.retry_pending.fetch_add(1, Ordering::Relaxed);

            let inner = inner.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                inner.retry_pending.fetch_sub(1, Ordering::Relaxed);
                inner
                    .pending
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push_back(retry);
            });
        } else {
            tracing::error!(
                job = envelope.job.kind(),
                id = %envelope.id,
                retries = envelope.retry_count,
                error = %error,
                "job permanently failed, dropping"
            );
        }
    }
}
