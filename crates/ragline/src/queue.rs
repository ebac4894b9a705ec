//! Job queue boundary for asynchronous ingestion.
//!
//! Queue-mode uploads hand the pipeline a job instead of running it
//! inline. The [`JobQueue`] trait keeps the transport swappable; the
//! in-process [`MemoryJobQueue`] is channel-backed and drained by the
//! worker pool in the same process. Enqueue failures are not fatal to
//! the upload — the orchestrator falls back to inline processing.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// A unit of ingestion work: one document, processed start to finish.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub job_id: String,
    pub document_id: i64,
    /// 1-based attempt counter, carried across retries.
    pub attempt: u32,
}

impl IngestJob {
    pub fn new(document_id: i64) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            document_id,
            attempt: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
    #[error("enqueue failed: {0}")]
    Enqueue(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job, returning its id.
    async fn enqueue(&self, job: IngestJob) -> Result<String, QueueError>;

    /// Receive the next job; `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Option<IngestJob>;

    /// Stop accepting jobs. Already-queued jobs remain dequeuable.
    fn close(&self);
}

/// Unbounded in-process queue over a tokio channel.
pub struct MemoryJobQueue {
    sender: Mutex<Option<tokio::sync::mpsc::UnboundedSender<IngestJob>>>,
    receiver: tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<IngestJob>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: IngestJob) -> Result<String, QueueError> {
        let job_id = job.job_id.clone();
        let guard = self.sender.lock().map_err(|_| QueueError::Closed)?;
        let sender = guard.as_ref().ok_or(QueueError::Closed)?;
        sender
            .send(job)
            .map_err(|e| QueueError::Enqueue(e.to_string()))?;
        Ok(job_id)
    }

    async fn dequeue(&self) -> Option<IngestJob> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    fn close(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            // Dropping the sender ends the stream after queued jobs drain.
            guard.take();
        }
    }
}
