//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the schema created by
//! [`crate::migrate`]: `collections`, `documents`, and `chunks` with
//! embeddings stored as little-endian f32 BLOBs.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use ragline_core::embedder::{blob_to_vec, vec_to_blob};
use ragline_core::models::{
    ChunkRecord, Collection, Document, DocumentStatus, NewChunk, NewDocument,
};
use ragline_core::store::Store;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let status_str: String = row.get("status");
    let status: DocumentStatus = status_str
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt status column: {e}"))?;
    Ok(Document {
        id: row.get("id"),
        name: row.get("name"),
        mime_type: row.get("mime_type"),
        content_ref: row.get("content_ref"),
        collection_id: row.get("collection_id"),
        org_slug: row.get("org_slug"),
        status,
        failure_reason: row.get("failure_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const DOCUMENT_COLUMNS: &str = "id, name, mime_type, content_ref, collection_id, org_slug, \
                                status, failure_reason, created_at, updated_at";

#[async_trait]
impl Store for SqliteStore {
    async fn create_collection(&self, name: &str, org_slug: &str) -> Result<Collection> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO collections (name, org_slug, created_at) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(org_slug)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(Collection {
                id: done.last_insert_rowid(),
                name: name.to_string(),
                org_slug: org_slug.to_string(),
                created_at: now,
            }),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                bail!("collection {name:?} already exists for org {org_slug:?}")
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_collection(&self, id: i64, org_slug: &str) -> Result<Option<Collection>> {
        let row = sqlx::query(
            "SELECT id, name, org_slug, created_at FROM collections WHERE id = ? AND org_slug = ?",
        )
        .bind(id)
        .bind(org_slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Collection {
            id: r.get("id"),
            name: r.get("name"),
            org_slug: r.get("org_slug"),
            created_at: r.get("created_at"),
        }))
    }

    async fn collections_for_org(&self, org_slug: &str) -> Result<Vec<Collection>> {
        let rows = sqlx::query(
            "SELECT id, name, org_slug, created_at FROM collections WHERE org_slug = ? ORDER BY id",
        )
        .bind(org_slug)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Collection {
                id: r.get("id"),
                name: r.get("name"),
                org_slug: r.get("org_slug"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn create_document(&self, doc: &NewDocument) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let done = sqlx::query(
            r#"
            INSERT INTO documents (name, mime_type, content_ref, collection_id, org_slug,
                                   status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.name)
        .bind(&doc.mime_type)
        .bind(&doc.content_ref)
        .bind(doc.collection_id)
        .bind(&doc.org_slug)
        .bind(doc.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(done.last_insert_rowid())
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| document_from_row(&r)).transpose()
    }

    async fn documents_for_org(&self, org_slug: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE org_slug = ? ORDER BY id"
        ))
        .bind(org_slug)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn documents_with_status(&self, status: DocumentStatus) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE status = ? ORDER BY id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn count_documents_in_collection(&self, collection_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection_id = ?")
                .bind(collection_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let done = sqlx::query(
            "UPDATE documents SET status = ?, failure_reason = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(reason)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            bail!("document {id} not found");
        }
        Ok(())
    }

    async fn append_chunks(&self, document_id: i64, chunks: &[NewChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // The existence check rides in the same transaction, so a delete
        // racing this write cannot leave orphaned chunk rows.
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM documents WHERE id = ?")
                .bind(document_id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            bail!("document {document_id} no longer exists");
        }

        let now = chrono::Utc::now().timestamp();
        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (document_id, chunk_index, text, embedding, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(document_id)
            .bind(chunk.index)
            .bind(&chunk.text)
            .bind(vec_to_blob(&chunk.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn chunks_for_collections(&self, collection_ids: &[i64]) -> Result<Vec<ChunkRecord>> {
        if collection_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; collection_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT c.document_id, c.chunk_index, c.text, c.embedding, c.created_at
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE d.collection_id IN ({placeholders})
            ORDER BY c.document_id, c.chunk_index
            "#
        );

        let mut query = sqlx::query(&sql);
        for id in collection_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|r| {
                let blob: Vec<u8> = r.get("embedding");
                ChunkRecord {
                    document_id: r.get("document_id"),
                    chunk_index: r.get("chunk_index"),
                    text: r.get("text"),
                    vector: blob_to_vec(&blob),
                    created_at: r.get("created_at"),
                }
            })
            .collect())
    }

    async fn delete_chunks_for_document(&self, document_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_document(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Chunks first; a crash between the two statements must not
        // leave chunks pointing at a missing document.
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
