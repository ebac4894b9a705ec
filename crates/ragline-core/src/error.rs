//! Pipeline error taxonomy.
//!
//! Every way an ingestion attempt can fail maps onto one variant here.
//! The orchestrator recovers all of these into a `failed` document
//! status plus a logged reason — callers poll status, they never see a
//! panic or an unhandled error. The split that matters operationally is
//! [`PipelineError::is_retryable`]: deterministic input failures go
//! straight to `failed`, transient infrastructure failures may be
//! retried at the job layer.

use std::time::Duration;
use thiserror::Error;

use crate::models::DocumentStatus;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The document's MIME type has no extraction path. Never retried.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Extraction ran and failed (corrupt input). Never retried.
    #[error("text extraction failed: {0}")]
    Extraction(String),

    /// Extraction succeeded but produced no text. Never retried.
    #[error("extracted text was empty")]
    EmptyExtraction,

    /// Chunking the extracted text produced no chunks. Never retried.
    #[error("chunking produced no chunks")]
    NoChunks,

    /// The embedding client exhausted its own per-call retries.
    #[error("embedding provider failed: {0}")]
    EmbeddingProvider(String),

    /// The content storage boundary was unreachable or timed out.
    #[error("content storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The job queue rejected a submission.
    #[error("job queue error: {0}")]
    Queue(String),

    /// Upload precondition: the target collection is full.
    #[error("collection {collection_id} is at capacity ({capacity} documents)")]
    CollectionFull { collection_id: i64, capacity: i64 },

    /// Upload precondition: the target collection does not exist in the
    /// caller's tenant scope.
    #[error("collection {0} not found")]
    CollectionNotFound(i64),

    #[error("document {0} not found")]
    DocumentNotFound(i64),

    /// The status state machine refused a transition.
    #[error("document cannot move from {from} to {to}")]
    IllegalTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    /// Wall-clock budget exceeded during inline execution.
    #[error("ingestion timed out after {0:?}")]
    Timeout(Duration),

    /// Store failure (database error etc.).
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether a queued job may re-run the whole document attempt after
    /// this failure. Input errors are deterministic — retrying cannot
    /// help — so only infrastructure-shaped failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::EmbeddingProvider(_)
                | PipelineError::StorageUnavailable(_)
                | PipelineError::Queue(_)
                | PipelineError::Timeout(_)
                | PipelineError::Store(_)
        )
    }
}
