//! End-to-end pipeline tests over the in-memory store and a filesystem
//! content store: upload through chunking, embedding, and retrieval,
//! in both inline and queue mode.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use ragline::config::{IngestConfig, IngestMode};
use ragline::ingest::{IngestService, Upload};
use ragline::queue::{IngestJob, JobQueue, MemoryJobQueue, QueueError};
use ragline::search;
use ragline::storage::FsStorage;
use ragline::worker::WorkerPool;
use ragline_core::chunk::ChunkPolicy;
use ragline_core::embedder::Embedder;
use ragline_core::error::PipelineError;
use ragline_core::models::DocumentStatus;
use ragline_core::store::{InMemoryStore, Store};

/// Deterministic embedder: a small fixed vector per text.
struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let len = t.chars().count() as f32;
                vec![1.0, len, len * 0.5]
            })
            .collect())
    }
}

/// Fails the first `failures` batches, then behaves like [`StubEmbedder`].
struct FlakyEmbedder {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyEmbedder {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            anyhow::bail!("provider unavailable (call {call})");
        }
        StubEmbedder.embed_batch(texts).await
    }
}

/// Never finishes within any sane inline budget.
struct SlowEmbedder;

#[async_trait]
impl Embedder for SlowEmbedder {
    fn model_name(&self) -> &str {
        "slow"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        StubEmbedder.embed_batch(texts).await
    }
}

/// A queue whose consumer runs the job to completion *inside* `enqueue`,
/// before the producer gets its acknowledgement — the fastest possible
/// worker pickup.
struct EagerQueue {
    service: std::sync::Mutex<Option<Arc<IngestService>>>,
}

#[async_trait]
impl JobQueue for EagerQueue {
    async fn enqueue(&self, job: IngestJob) -> Result<String, QueueError> {
        let service = self
            .service
            .lock()
            .unwrap()
            .clone()
            .expect("service wired before first enqueue");
        service
            .run_attempt(job.document_id)
            .await
            .map_err(|e| QueueError::Enqueue(e.to_string()))?;
        Ok(job.job_id)
    }

    async fn dequeue(&self) -> Option<IngestJob> {
        None
    }

    fn close(&self) {}
}

struct Harness {
    store: Arc<InMemoryStore>,
    queue: Arc<MemoryJobQueue>,
    service: Arc<IngestService>,
    config: IngestConfig,
    _tmp: TempDir,
}

fn harness_with(embedder: Arc<dyn Embedder>, config: IngestConfig) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let storage = Arc::new(FsStorage::new(tmp.path()));
    let queue = Arc::new(MemoryJobQueue::new());

    let service = Arc::new(IngestService::new(
        store.clone(),
        storage,
        embedder,
        queue.clone(),
        ChunkPolicy::new(40, 10).unwrap(),
        &config,
        std::time::Duration::from_secs(5),
    ));

    Harness {
        store,
        queue,
        service,
        config,
        _tmp: tmp,
    }
}

fn inline_config() -> IngestConfig {
    IngestConfig {
        mode: IngestMode::Inline,
        ..IngestConfig::default()
    }
}

fn queue_config(job_attempts: u32) -> IngestConfig {
    IngestConfig {
        mode: IngestMode::Queue,
        job_attempts,
        job_backoff_ms: 1,
        worker_concurrency: 2,
        ..IngestConfig::default()
    }
}

fn text_upload(collection_id: Option<i64>, body: &str) -> Upload {
    Upload {
        name: "notes.txt".to_string(),
        mime_type: "text/plain".to_string(),
        bytes: body.as_bytes().to_vec(),
        collection_id,
        org_slug: "acme".to_string(),
    }
}

const BODY: &str = "The onboarding handbook covers vacation policy, expense reports, \
                    and the quarterly review cycle in painstaking detail.";

#[tokio::test]
async fn inline_upload_completes_with_chunks() {
    let h = harness_with(Arc::new(StubEmbedder), inline_config());
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, status) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();
    assert_eq!(status, DocumentStatus::Completed);

    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert!(doc.failure_reason.is_none());

    let chunks = h.store.chunks_for_collections(&[coll.id]).await.unwrap();
    assert!(!chunks.is_empty());
    // Dense 0-based indexes in order.
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i as i64);
        assert_eq!(chunk.vector.len(), 3);
    }
}

#[tokio::test]
async fn whitespace_document_fails_without_chunks() {
    let h = harness_with(Arc::new(StubEmbedder), inline_config());
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, status) = h
        .service
        .ingest(text_upload(Some(coll.id), "   \n\t  "))
        .await
        .unwrap();
    assert_eq!(status, DocumentStatus::Failed);

    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.failure_reason.unwrap().contains("empty"));
    assert!(h.store.chunks_for_collections(&[coll.id]).await.unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_mime_fails_terminally() {
    let h = harness_with(Arc::new(StubEmbedder), inline_config());

    let (id, _) = h
        .service
        .ingest(Upload {
            name: "blob.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            bytes: vec![0, 1, 2],
            collection_id: None,
            org_slug: "acme".to_string(),
        })
        .await
        .unwrap();

    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.failure_reason.unwrap().contains("unsupported format"));
}

#[tokio::test]
async fn embedding_failure_marks_document_failed() {
    let h = harness_with(Arc::new(FlakyEmbedder::new(u32::MAX)), inline_config());
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, _) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();

    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.failure_reason.unwrap().contains("embedding provider"));
    assert!(h.store.chunks_for_collections(&[coll.id]).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_collection_rejects_upload_before_any_record() {
    let h = harness_with(Arc::new(StubEmbedder), inline_config());

    let err = h.service.ingest(text_upload(Some(99), BODY)).await.unwrap_err();
    assert!(matches!(err, PipelineError::CollectionNotFound(99)));
    assert!(h.store.documents_for_org("acme").await.unwrap().is_empty());
}

#[tokio::test]
async fn full_collection_rejects_upload() {
    let config = IngestConfig {
        collection_capacity: Some(1),
        ..inline_config()
    };
    let h = harness_with(Arc::new(StubEmbedder), config);
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();
    let err = h
        .service
        .ingest(text_upload(Some(coll.id), BODY))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::CollectionFull { .. }));
    assert_eq!(h.store.documents_for_org("acme").await.unwrap().len(), 1);
}

#[tokio::test]
async fn queued_upload_waits_for_a_worker() {
    let h = harness_with(Arc::new(StubEmbedder), queue_config(5));
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, status) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();
    assert_eq!(status, DocumentStatus::Queued);

    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Queued);

    h.queue.close();
    WorkerPool::new(h.service.clone(), h.queue.clone(), &h.config)
        .run()
        .await;

    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert!(!h.store.chunks_for_collections(&[coll.id]).await.unwrap().is_empty());
}

#[tokio::test]
async fn worker_retries_transient_failures_to_completion() {
    // Fails the first two embedding calls; three attempts suffice.
    let h = harness_with(Arc::new(FlakyEmbedder::new(2)), queue_config(3));
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, _) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();

    h.queue.close();
    WorkerPool::new(h.service.clone(), h.queue.clone(), &h.config)
        .run()
        .await;

    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
}

#[tokio::test]
async fn worker_gives_up_after_attempt_budget() {
    let h = harness_with(Arc::new(FlakyEmbedder::new(u32::MAX)), queue_config(2));
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, _) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();

    h.queue.close();
    WorkerPool::new(h.service.clone(), h.queue.clone(), &h.config)
        .run()
        .await;

    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.failure_reason.is_some());
}

#[tokio::test]
async fn closed_queue_falls_back_to_inline() {
    let h = harness_with(Arc::new(StubEmbedder), queue_config(5));
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    h.queue.close();
    let (id, status) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();
    assert_eq!(status, DocumentStatus::Completed);

    // No worker ever ran, yet the document reached a terminal status.
    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
}

#[tokio::test]
async fn retry_reruns_a_failed_document_inline() {
    // First two embedding calls fail: the upload and the first retry.
    let h = harness_with(Arc::new(FlakyEmbedder::new(2)), inline_config());
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, status) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();
    assert_eq!(status, DocumentStatus::Failed);

    let status = h.service.retry(id).await.unwrap();
    assert_eq!(status, DocumentStatus::Failed);
    let status = h.service.retry(id).await.unwrap();
    assert_eq!(status, DocumentStatus::Completed);
}

#[tokio::test]
async fn retry_rejects_non_failed_documents() {
    let h = harness_with(Arc::new(StubEmbedder), inline_config());
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, _) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();
    let err = h.service.retry(id).await.unwrap_err();
    assert!(matches!(err, PipelineError::IllegalTransition { .. }));
}

#[tokio::test]
async fn delete_removes_document_and_chunks() {
    let h = harness_with(Arc::new(StubEmbedder), inline_config());
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, _) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();
    assert!(!h.store.chunks_for_collections(&[coll.id]).await.unwrap().is_empty());

    h.service.delete(id).await.unwrap();
    assert!(h.store.get_document(id).await.unwrap().is_none());
    assert!(h.store.chunks_for_collections(&[coll.id]).await.unwrap().is_empty());
}

#[tokio::test]
async fn inline_timeout_fails_without_partial_chunks() {
    let config = IngestConfig {
        inline_timeout_secs: 0,
        ..inline_config()
    };
    let h = harness_with(Arc::new(SlowEmbedder), config);
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    let (id, status) = h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();
    assert_eq!(status, DocumentStatus::Failed);

    let doc = h.store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.failure_reason.unwrap().contains("timed out"));
    // The pipeline was cut off before its transactional append.
    assert!(h.store.chunks_for_collections(&[coll.id]).await.unwrap().is_empty());
}

#[tokio::test]
async fn upload_survives_worker_pickup_during_enqueue() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(EagerQueue {
        service: std::sync::Mutex::new(None),
    });
    let service = Arc::new(IngestService::new(
        store.clone(),
        Arc::new(FsStorage::new(tmp.path())),
        Arc::new(StubEmbedder),
        queue.clone(),
        ChunkPolicy::new(40, 10).unwrap(),
        &queue_config(5),
        std::time::Duration::from_secs(5),
    ));
    *queue.service.lock().unwrap() = Some(service.clone());

    let coll = store.create_collection("docs", "acme").await.unwrap();

    // The job finished before enqueue returned; the upload must still
    // report success and the document must stay completed.
    let (id, _) = service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();
    let doc = store.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
}

#[tokio::test]
async fn search_finds_ingested_content() {
    let h = harness_with(Arc::new(StubEmbedder), inline_config());
    let coll = h.store.create_collection("docs", "acme").await.unwrap();

    h.service.ingest(text_upload(Some(coll.id), BODY)).await.unwrap();

    let hits = search::search(h.store.as_ref(), &StubEmbedder, "vacation policy", &[coll.id], 3)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.len() <= 3);
    // Scores descend.
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}
