//! Semantic search over stored chunks.
//!
//! Embeds the query, loads every chunk in the requested collections,
//! and brute-force ranks by cosine similarity. Exact and deterministic:
//! equal scores keep the store's chunk order
//! (`document_id, chunk_index` ascending).

use anyhow::Result;
use tracing::debug;

use ragline_core::embedder::Embedder;
use ragline_core::models::SearchHit;
use ragline_core::rank;
use ragline_core::store::Store;

/// Search chunks in the given collections for the query text.
///
/// A blank query or an empty collection scope returns no hits rather
/// than an error. `top_k` caps the result count; fewer chunks than
/// `top_k` means fewer hits.
pub async fn search(
    store: &dyn Store,
    embedder: &dyn Embedder,
    query: &str,
    collection_ids: &[i64],
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() || collection_ids.is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embedder.embed(query).await?;
    let chunks = store.chunks_for_collections(collection_ids).await?;

    debug!(
        candidates = chunks.len(),
        collections = collection_ids.len(),
        "ranking chunks"
    );

    let candidates: Vec<((i64, String), Vec<f32>)> = chunks
        .into_iter()
        .map(|c| ((c.document_id, c.text), c.vector))
        .collect();

    let hits = rank::rank(&query_vec, candidates, top_k)
        .into_iter()
        .map(|((document_id, content), score)| SearchHit {
            content,
            score,
            document_id,
        })
        .collect();

    Ok(hits)
}
