//! Core data models for documents, chunks, and collections.
//!
//! These types flow through the ingestion and retrieval pipeline. The
//! [`DocumentStatus`] enum also encodes the lifecycle state machine:
//! which transitions are legal is decided here, in one place, and the
//! orchestrator refuses anything else.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of an uploaded document.
///
/// ```text
/// pending ──▶ queued ──▶ processing ──▶ completed
///    │            ▲          │  ▲
///    └────────────┼──────────┘  │
///                 │             ▼
///                 └───────── failed
/// ```
///
/// Status advances monotonically except for retry paths: a job-level
/// retry moves `processing` back to `queued`, and a manual retry moves
/// `failed` back to `processing` (inline) or `queued` (queue mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Error)]
#[error("unknown document status: {0}")]
pub struct ParseStatusError(pub String);

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Queued => "queued",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Pending, Processing)
                | (Queued, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                // Job-level retry puts an in-flight attempt back on the queue.
                | (Processing, Queued)
                // Manual retry of a failed document.
                | (Failed, Processing)
                | (Failed, Queued)
        )
    }

    /// Terminal states for an ingestion attempt.
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "queued" => Ok(DocumentStatus::Queued),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// An uploaded document as stored.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    pub name: String,
    pub mime_type: String,
    /// Opaque reference into the content storage boundary.
    pub content_ref: String,
    pub collection_id: Option<i64>,
    pub org_slug: String,
    pub status: DocumentStatus,
    /// Reason string recorded when `status` is `failed`.
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields required to create a document record.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub mime_type: String,
    pub content_ref: String,
    pub collection_id: Option<i64>,
    pub org_slug: String,
    pub status: DocumentStatus,
}

/// A named grouping of documents used to scope retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub org_slug: String,
    pub created_at: i64,
}

/// A stored chunk: text plus its embedding vector.
///
/// Identity is the `(document_id, chunk_index)` pair; `chunk_index` is a
/// dense 0-based sequence per document with no gaps.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub document_id: i64,
    pub chunk_index: i64,
    pub text: String,
    pub vector: Vec<f32>,
    pub created_at: i64,
}

/// A chunk produced by the pipeline, not yet persisted.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub index: i64,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub content: String,
    pub score: f32,
    pub document_id: i64,
}
