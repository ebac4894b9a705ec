//! Vector store abstraction.
//!
//! [`Store`] is the persistence seam: the application crate provides a
//! SQLite-backed implementation, and [`InMemoryStore`] backs tests. All
//! methods are atomic from the caller's perspective — in particular
//! [`Store::append_chunks`] must persist all chunks of a document or
//! none of them, and must refuse to write chunks for a document that no
//! longer exists.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkRecord, Collection, Document, DocumentStatus, NewChunk, NewDocument};

mod memory;

pub use memory::InMemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_collection(&self, name: &str, org_slug: &str) -> Result<Collection>;

    async fn get_collection(&self, id: i64, org_slug: &str) -> Result<Option<Collection>>;

    async fn collections_for_org(&self, org_slug: &str) -> Result<Vec<Collection>>;

    /// Create a document record, returning its id.
    async fn create_document(&self, doc: &NewDocument) -> Result<i64>;

    async fn get_document(&self, id: i64) -> Result<Option<Document>>;

    async fn documents_for_org(&self, org_slug: &str) -> Result<Vec<Document>>;

    async fn documents_with_status(&self, status: DocumentStatus) -> Result<Vec<Document>>;

    async fn count_documents_in_collection(&self, collection_id: i64) -> Result<i64>;

    /// Set a document's status, recording `reason` when it is `failed`
    /// and clearing any previous reason otherwise.
    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        reason: Option<&str>,
    ) -> Result<()>;

    /// Append a document's chunks in one transaction.
    ///
    /// Fails without writing anything if the document has been deleted
    /// since the pipeline attempt started.
    async fn append_chunks(&self, document_id: i64, chunks: &[NewChunk]) -> Result<()>;

    /// All chunks of documents in the given collections. An empty id
    /// slice yields no chunks.
    async fn chunks_for_collections(&self, collection_ids: &[i64]) -> Result<Vec<ChunkRecord>>;

    async fn delete_chunks_for_document(&self, document_id: i64) -> Result<()>;

    /// Delete a document and its chunks, chunks first.
    async fn delete_document(&self, id: i64) -> Result<()>;
}
