//! In-memory [`Store`] used by tests and examples.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{ChunkRecord, Collection, Document, DocumentStatus, NewChunk, NewDocument};
use crate::store::Store;

#[derive(Default)]
struct Inner {
    collections: Vec<Collection>,
    documents: HashMap<i64, Document>,
    chunks: Vec<ChunkRecord>,
    next_collection_id: i64,
    next_document_id: i64,
}

/// A `HashMap`-backed store. Chunk ordering follows insertion order,
/// which matches the SQLite store's `ORDER BY document_id, chunk_index`
/// for the single-writer-per-document pipeline.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_collection(&self, name: &str, org_slug: &str) -> Result<Collection> {
        let mut inner = self.inner.write().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        if inner
            .collections
            .iter()
            .any(|c| c.name == name && c.org_slug == org_slug)
        {
            bail!("collection {name:?} already exists for org {org_slug:?}");
        }
        inner.next_collection_id += 1;
        let collection = Collection {
            id: inner.next_collection_id,
            name: name.to_string(),
            org_slug: org_slug.to_string(),
            created_at: Self::now(),
        };
        inner.collections.push(collection.clone());
        Ok(collection)
    }

    async fn get_collection(&self, id: i64, org_slug: &str) -> Result<Option<Collection>> {
        let inner = self.inner.read().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        Ok(inner
            .collections
            .iter()
            .find(|c| c.id == id && c.org_slug == org_slug)
            .cloned())
    }

    async fn collections_for_org(&self, org_slug: &str) -> Result<Vec<Collection>> {
        let inner = self.inner.read().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        Ok(inner
            .collections
            .iter()
            .filter(|c| c.org_slug == org_slug)
            .cloned()
            .collect())
    }

    async fn create_document(&self, doc: &NewDocument) -> Result<i64> {
        let mut inner = self.inner.write().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        inner.next_document_id += 1;
        let id = inner.next_document_id;
        let now = Self::now();
        inner.documents.insert(
            id,
            Document {
                id,
                name: doc.name.clone(),
                mime_type: doc.mime_type.clone(),
                content_ref: doc.content_ref.clone(),
                collection_id: doc.collection_id,
                org_slug: doc.org_slug.clone(),
                status: doc.status,
                failure_reason: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let inner = self.inner.read().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        Ok(inner.documents.get(&id).cloned())
    }

    async fn documents_for_org(&self, org_slug: &str) -> Result<Vec<Document>> {
        let inner = self.inner.read().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let mut docs: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| d.org_slug == org_slug)
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.id);
        Ok(docs)
    }

    async fn documents_with_status(&self, status: DocumentStatus) -> Result<Vec<Document>> {
        let inner = self.inner.read().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let mut docs: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.id);
        Ok(docs)
    }

    async fn count_documents_in_collection(&self, collection_id: i64) -> Result<i64> {
        let inner = self.inner.read().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        Ok(inner
            .documents
            .values()
            .filter(|d| d.collection_id == Some(collection_id))
            .count() as i64)
    }

    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let doc = inner
            .documents
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("document {id} not found"))?;
        doc.status = status;
        doc.failure_reason = reason.map(str::to_string);
        doc.updated_at = Self::now();
        Ok(())
    }

    async fn append_chunks(&self, document_id: i64, chunks: &[NewChunk]) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        if !inner.documents.contains_key(&document_id) {
            bail!("document {document_id} no longer exists");
        }
        let now = Self::now();
        for chunk in chunks {
            inner.chunks.push(ChunkRecord {
                document_id,
                chunk_index: chunk.index,
                text: chunk.text.clone(),
                vector: chunk.vector.clone(),
                created_at: now,
            });
        }
        Ok(())
    }

    async fn chunks_for_collections(&self, collection_ids: &[i64]) -> Result<Vec<ChunkRecord>> {
        if collection_ids.is_empty() {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let doc_ids: Vec<i64> = inner
            .documents
            .values()
            .filter(|d| d.collection_id.is_some_and(|c| collection_ids.contains(&c)))
            .map(|d| d.id)
            .collect();
        Ok(inner
            .chunks
            .iter()
            .filter(|c| doc_ids.contains(&c.document_id))
            .cloned()
            .collect())
    }

    async fn delete_chunks_for_document(&self, document_id: i64) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        inner.chunks.retain(|c| c.document_id != document_id);
        Ok(())
    }

    async fn delete_document(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        inner.chunks.retain(|c| c.document_id != id);
        inner.documents.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_doc(collection_id: Option<i64>) -> NewDocument {
        NewDocument {
            name: "notes.txt".into(),
            mime_type: "text/plain".into(),
            content_ref: "sha256/abc".into(),
            collection_id,
            org_slug: "acme".into(),
            status: DocumentStatus::Pending,
        }
    }

    #[tokio::test]
    async fn collection_names_are_unique_per_org() {
        let store = InMemoryStore::new();
        store.create_collection("docs", "acme").await.unwrap();
        assert!(store.create_collection("docs", "acme").await.is_err());
        // Same name in another org is fine.
        store.create_collection("docs", "globex").await.unwrap();
    }

    #[tokio::test]
    async fn append_chunks_refuses_missing_document() {
        let store = InMemoryStore::new();
        let chunk = NewChunk {
            index: 0,
            text: "hello".into(),
            vector: vec![1.0, 0.0],
        };
        assert!(store.append_chunks(42, &[chunk]).await.is_err());
    }

    #[tokio::test]
    async fn delete_document_removes_its_chunks() {
        let store = InMemoryStore::new();
        let coll = store.create_collection("docs", "acme").await.unwrap();
        let id = store.create_document(&new_doc(Some(coll.id))).await.unwrap();
        store
            .append_chunks(
                id,
                &[NewChunk {
                    index: 0,
                    text: "hello".into(),
                    vector: vec![1.0],
                }],
            )
            .await
            .unwrap();
        assert_eq!(store.chunks_for_collections(&[coll.id]).await.unwrap().len(), 1);

        store.delete_document(id).await.unwrap();
        assert!(store.chunks_for_collections(&[coll.id]).await.unwrap().is_empty());
        assert!(store.get_document(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_collection_scope_yields_no_chunks() {
        let store = InMemoryStore::new();
        assert!(store.chunks_for_collections(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_status_records_and_clears_reason() {
        let store = InMemoryStore::new();
        let id = store.create_document(&new_doc(None)).await.unwrap();
        store
            .update_status(id, DocumentStatus::Failed, Some("boom"))
            .await
            .unwrap();
        let doc = store.get_document(id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.failure_reason.as_deref(), Some("boom"));

        store
            .update_status(id, DocumentStatus::Processing, None)
            .await
            .unwrap();
        let doc = store.get_document(id).await.unwrap().unwrap();
        assert!(doc.failure_reason.is_none());
    }
}
