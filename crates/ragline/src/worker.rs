//! Worker pool draining the job queue.
//!
//! Spawns a fixed number of tasks that pull [`IngestJob`]s off the
//! queue. A job is one document processed start to finish by a single
//! worker; retries happen in place — the worker sleeps out the backoff
//! and reruns the attempt itself rather than round-tripping through the
//! queue, so a closed queue never strands a retryable document. The
//! document still passes through `queued` between attempts so observers
//! see the retry.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::ingest::IngestService;
use crate::queue::{IngestJob, JobQueue};

pub struct WorkerPool {
    service: Arc<IngestService>,
    queue: Arc<dyn JobQueue>,
    concurrency: usize,
    max_attempts: u32,
    backoff_base: std::time::Duration,
}

impl WorkerPool {
    pub fn new(
        service: Arc<IngestService>,
        queue: Arc<dyn JobQueue>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            service,
            queue,
            concurrency: config.worker_concurrency,
            max_attempts: config.job_attempts,
            backoff_base: config.job_backoff(),
        }
    }

    /// Run workers until the queue is closed and drained.
    pub async fn run(&self) {
        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_id in 0..self.concurrency {
            let service = Arc::clone(&self.service);
            let queue = Arc::clone(&self.queue);
            let max_attempts = self.max_attempts;
            let backoff_base = self.backoff_base;

            handles.push(tokio::spawn(async move {
                while let Some(job) = queue.dequeue().await {
                    process_job(&service, job, max_attempts, backoff_base, worker_id).await;
                }
            }));
        }

        for handle in handles {
            // Worker tasks don't panic on job failures; a join error
            // here is a bug worth logging, not propagating.
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task aborted");
            }
        }
    }
}

/// Drive one job to a terminal document status, retrying transient
/// failures with exponential backoff.
async fn process_job(
    service: &IngestService,
    job: IngestJob,
    max_attempts: u32,
    backoff_base: std::time::Duration,
    worker_id: usize,
) {
    let mut attempt = job.attempt;

    loop {
        info!(
            worker_id,
            job_id = %job.job_id,
            document_id = job.document_id,
            attempt,
            "processing job"
        );

        let error = match service.run_attempt(job.document_id).await {
            Ok(()) => {
                info!(job_id = %job.job_id, document_id = job.document_id, "job completed");
                return;
            }
            Err(e) => e,
        };

        if error.is_retryable() && attempt < max_attempts {
            // Backoff: base, 2×base, 4×base, ...
            let delay = backoff_base * 2u32.pow(attempt.saturating_sub(1).min(16));
            warn!(
                job_id = %job.job_id,
                document_id = job.document_id,
                attempt,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "attempt failed, retrying"
            );
            if let Err(e) = service.requeue(job.document_id).await {
                warn!(document_id = job.document_id, error = %e, "requeue transition failed");
                return;
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
            continue;
        }

        if let Err(e) = service.mark_failed(job.document_id, &error).await {
            warn!(document_id = job.document_id, error = %e, "failed to record failure");
        }
        return;
    }
}
