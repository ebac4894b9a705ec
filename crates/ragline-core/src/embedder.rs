//! Embedder trait and vector blob codecs.
//!
//! The [`Embedder`] trait is the seam between the pipeline and whatever
//! produces vectors. The application crate implements it over a remote
//! OpenAI-compatible provider with retry and backoff; tests substitute
//! deterministic stubs. Any error surfaced by an implementation is
//! terminal from the caller's perspective — per-call retry policy lives
//! behind this trait, not in front of it.

use anyhow::Result;
use async_trait::async_trait;

/// Produces fixed-dimension embedding vectors for text.
///
/// Implementations must be safe to call concurrently from multiple
/// workers and must report a stable dimensionality for the lifetime of
/// a store.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input
    /// order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (e.g. a search query).
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let vectors = self.embed_batch(&texts).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedding provider returned an empty batch"))
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a
/// BLOB of `vec.len() × 4` bytes, the layout used by the SQLite store.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector, reversing [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn blob_length_is_four_bytes_per_dim() {
        assert_eq!(vec_to_blob(&[1.0, 2.0, 3.0]).len(), 12);
        assert!(vec_to_blob(&[]).is_empty());
    }
}
