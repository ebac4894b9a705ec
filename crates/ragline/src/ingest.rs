//! Ingestion orchestrator.
//!
//! Owns the document lifecycle from upload to terminal status. An
//! upload is validated (collection exists, capacity available), its
//! bytes are persisted to content storage, and a `pending` document
//! record is created. From there the pipeline runs either **inline**
//! under a wall-clock budget, or through the **job queue** for a worker
//! to pick up.
//!
//! The pipeline itself is the same in both modes:
//! extract → chunk → embed → append chunks. Every failure is recovered
//! into a `failed` status with a recorded reason; nothing in this
//! module panics on bad input. Status changes always go through
//! [`IngestService::transition`], which enforces the lifecycle state
//! machine.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{IngestConfig, IngestMode};
use crate::extract;
use crate::queue::{IngestJob, JobQueue};
use crate::storage::ContentStorage;
use ragline_core::chunk::ChunkPolicy;
use ragline_core::embedder::Embedder;
use ragline_core::error::PipelineError;
use ragline_core::models::{Document, DocumentStatus, NewChunk, NewDocument};
use ragline_core::store::Store;

/// An upload request as received from the CLI or an embedding caller.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub collection_id: Option<i64>,
    pub org_slug: String,
}

pub struct IngestService {
    store: Arc<dyn Store>,
    storage: Arc<dyn ContentStorage>,
    embedder: Arc<dyn Embedder>,
    queue: Arc<dyn JobQueue>,
    policy: ChunkPolicy,
    mode: IngestMode,
    inline_timeout: Duration,
    put_timeout: Duration,
    collection_capacity: Option<i64>,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn Store>,
        storage: Arc<dyn ContentStorage>,
        embedder: Arc<dyn Embedder>,
        queue: Arc<dyn JobQueue>,
        policy: ChunkPolicy,
        ingest: &IngestConfig,
        put_timeout: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            embedder,
            queue,
            policy,
            mode: ingest.mode,
            inline_timeout: ingest.inline_timeout(),
            put_timeout,
            collection_capacity: ingest.collection_capacity,
        }
    }

    /// Accept an upload and drive it to a status.
    ///
    /// Returns the new document id and the status it reached. In inline
    /// mode that status is terminal (`completed` or `failed`); in queue
    /// mode it is `queued` at the moment of submission and a worker
    /// finishes the document. Precondition failures (missing collection,
    /// capacity, storage write) reject the upload before any document
    /// record exists.
    pub async fn ingest(&self, upload: Upload) -> Result<(i64, DocumentStatus), PipelineError> {
        if let Some(collection_id) = upload.collection_id {
            let collection = self
                .store
                .get_collection(collection_id, &upload.org_slug)
                .await?;
            if collection.is_none() {
                return Err(PipelineError::CollectionNotFound(collection_id));
            }
            if let Some(capacity) = self.collection_capacity {
                let count = self.store.count_documents_in_collection(collection_id).await?;
                if count >= capacity {
                    return Err(PipelineError::CollectionFull {
                        collection_id,
                        capacity,
                    });
                }
            }
        }

        // Bytes land in storage before the document record exists, so a
        // storage failure leaves nothing behind to clean up.
        let content_ref = match tokio::time::timeout(
            self.put_timeout,
            self.storage.put(&upload.name, &upload.bytes),
        )
        .await
        {
            Ok(Ok(content_ref)) => content_ref,
            Ok(Err(e)) => return Err(PipelineError::StorageUnavailable(e.to_string())),
            Err(_) => {
                return Err(PipelineError::StorageUnavailable(format!(
                    "content write timed out after {:?}",
                    self.put_timeout
                )))
            }
        };

        let document_id = self
            .store
            .create_document(&NewDocument {
                name: upload.name.clone(),
                mime_type: upload.mime_type.clone(),
                content_ref,
                collection_id: upload.collection_id,
                org_slug: upload.org_slug.clone(),
                status: DocumentStatus::Pending,
            })
            .await?;

        info!(document_id, name = %upload.name, mode = ?self.mode, "accepted upload");

        let status = match self.mode {
            IngestMode::Inline => self.run_inline(document_id).await?,
            IngestMode::Queue => {
                // The document must already read `queued` when the job
                // becomes visible: a worker can pick it up before the
                // enqueue acknowledgement lands, and its transitions
                // start from `queued`.
                self.transition(document_id, DocumentStatus::Queued, None)
                    .await?;
                match self.queue.enqueue(IngestJob::new(document_id)).await {
                    Ok(job_id) => {
                        info!(document_id, job_id = %job_id, "enqueued ingestion job");
                        DocumentStatus::Queued
                    }
                    Err(e) => {
                        // The document exists and its bytes are stored, so a
                        // broken queue degrades to inline processing.
                        warn!(document_id, error = %e, "enqueue failed, processing inline");
                        self.run_inline(document_id).await?
                    }
                }
            }
        };

        Ok((document_id, status))
    }

    /// Run the pipeline inline under the wall-clock budget, recovering
    /// the outcome into a terminal status.
    pub async fn run_inline(&self, document_id: i64) -> Result<DocumentStatus, PipelineError> {
        self.transition(document_id, DocumentStatus::Processing, None)
            .await?;

        let outcome = tokio::time::timeout(self.inline_timeout, self.run_pipeline(document_id)).await;
        match outcome {
            Ok(Ok(())) => {
                self.transition(document_id, DocumentStatus::Completed, None)
                    .await?;
                Ok(DocumentStatus::Completed)
            }
            Ok(Err(e)) => {
                self.mark_failed(document_id, &e).await?;
                Ok(DocumentStatus::Failed)
            }
            Err(_) => {
                let e = PipelineError::Timeout(self.inline_timeout);
                self.mark_failed(document_id, &e).await?;
                Ok(DocumentStatus::Failed)
            }
        }
    }

    /// One worker attempt: move to `processing` and run the pipeline.
    ///
    /// No wall-clock budget here — queued work is allowed to take as
    /// long as it takes. The caller (the worker pool) decides between
    /// retry and `failed` based on the returned error.
    pub async fn run_attempt(&self, document_id: i64) -> Result<(), PipelineError> {
        self.transition(document_id, DocumentStatus::Processing, None)
            .await?;

        match self.run_pipeline(document_id).await {
            Ok(()) => {
                self.transition(document_id, DocumentStatus::Completed, None)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Record a pipeline failure on the document.
    pub async fn mark_failed(
        &self,
        document_id: i64,
        error: &PipelineError,
    ) -> Result<(), PipelineError> {
        let reason = error.to_string();
        warn!(document_id, reason = %reason, "ingestion failed");
        self.transition(document_id, DocumentStatus::Failed, Some(&reason))
            .await
    }

    /// Put an in-flight document back on the queue for another attempt.
    pub async fn requeue(&self, document_id: i64) -> Result<(), PipelineError> {
        self.transition(document_id, DocumentStatus::Queued, None)
            .await
    }

    /// Manually retry a `failed` document, or re-enqueue a `queued` one
    /// whose job was lost.
    ///
    /// In queue mode the document is re-enqueued; inline mode reruns the
    /// pipeline immediately.
    pub async fn retry(&self, document_id: i64) -> Result<DocumentStatus, PipelineError> {
        let doc = self.get_document(document_id).await?;
        if !matches!(doc.status, DocumentStatus::Failed | DocumentStatus::Queued) {
            return Err(PipelineError::IllegalTransition {
                from: doc.status,
                to: DocumentStatus::Processing,
            });
        }

        match self.mode {
            IngestMode::Inline => self.run_inline(document_id).await,
            IngestMode::Queue => {
                // `queued` goes in before the job is visible, same as the
                // upload path.
                if doc.status != DocumentStatus::Queued {
                    self.transition(document_id, DocumentStatus::Queued, None)
                        .await?;
                }
                match self.queue.enqueue(IngestJob::new(document_id)).await {
                    Ok(_) => Ok(DocumentStatus::Queued),
                    Err(e) => {
                        warn!(document_id, error = %e, "enqueue failed, retrying inline");
                        self.run_inline(document_id).await
                    }
                }
            }
        }
    }

    /// Delete a document, its chunks, and its stored content.
    pub async fn delete(&self, document_id: i64) -> Result<(), PipelineError> {
        let doc = self.get_document(document_id).await?;
        self.store.delete_document(document_id).await?;
        // Content blobs are shared between identical uploads, so a
        // missing blob here is not an error.
        if let Err(e) = self.storage.delete(&doc.content_ref).await {
            warn!(document_id, error = %e, "content blob cleanup failed");
        }
        info!(document_id, "deleted document");
        Ok(())
    }

    /// Extract → chunk → embed → persist for one document.
    ///
    /// Pure pipeline: no status writes. Errors classify the failure for
    /// the retry decision upstream.
    async fn run_pipeline(&self, document_id: i64) -> Result<(), PipelineError> {
        let doc = self.get_document(document_id).await?;

        let bytes = self
            .storage
            .get(&doc.content_ref)
            .await
            .map_err(|e| PipelineError::StorageUnavailable(e.to_string()))?;

        let text = extract::extract_text(&bytes, &doc.mime_type)?;
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyExtraction);
        }

        let chunks = self.policy.split(&text);
        if chunks.is_empty() {
            return Err(PipelineError::NoChunks);
        }

        let vectors = self
            .embedder
            .embed_batch(&chunks)
            .await
            .map_err(|e| PipelineError::EmbeddingProvider(e.to_string()))?;

        let new_chunks: Vec<NewChunk> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| NewChunk {
                index: i as i64,
                text,
                vector,
            })
            .collect();

        // Fails atomically if the document was deleted mid-flight.
        self.store.append_chunks(document_id, &new_chunks).await?;

        info!(document_id, chunks = new_chunks.len(), "indexed document");
        Ok(())
    }

    /// Apply a lifecycle transition, enforcing the state machine.
    async fn transition(
        &self,
        document_id: i64,
        next: DocumentStatus,
        reason: Option<&str>,
    ) -> Result<(), PipelineError> {
        let doc = self.get_document(document_id).await?;
        if !doc.status.can_transition(next) {
            return Err(PipelineError::IllegalTransition {
                from: doc.status,
                to: next,
            });
        }
        self.store.update_status(document_id, next, reason).await?;
        Ok(())
    }

    async fn get_document(&self, document_id: i64) -> Result<Document, PipelineError> {
        self.store
            .get_document(document_id)
            .await?
            .ok_or(PipelineError::DocumentNotFound(document_id))
    }
}
