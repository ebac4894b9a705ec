//! Cosine similarity and brute-force top-K ranking.
//!
//! Exact, unindexed ranking over all candidates — the corpus sizes this
//! engine targets do not justify an ANN index. Ranking is a pure
//! function: no I/O, idempotent, and deterministic. Ties keep the input
//! iteration order (the sort is stable), so callers that need a
//! different tie-break pre-order their candidates.

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`. Zero-norm vectors, empty vectors,
/// and mismatched lengths all yield `0.0` — never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Rank `candidates` against `query` by cosine similarity, descending,
/// and return the top `k`.
///
/// `k` larger than the candidate count returns every candidate. The id
/// type is caller-chosen so the retrieval layer can carry whatever
/// payload it needs through the ranking.
pub fn rank<T>(query: &[f32], candidates: Vec<(T, Vec<f32>)>, k: usize) -> Vec<(T, f32)> {
    let mut scored: Vec<(T, f32)> = candidates
        .into_iter()
        .map(|(id, vector)| {
            let score = cosine_similarity(query, &vector);
            (id, score)
        })
        .collect();

    // sort_by is stable: equal scores preserve candidate input order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero_not_nan() {
        let zero = vec![0.0, 0.0, 0.0];
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&zero, &v);
        assert_eq!(sim, 0.0);
        assert!(!sim.is_nan());
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn rank_returns_self_match_first() {
        let query = vec![0.5, 0.5, 0.0];
        let candidates = vec![
            (1, vec![0.9, -0.1, 0.3]),
            (2, vec![0.5, 0.5, 0.0]),
            (3, vec![-0.5, -0.5, 0.0]),
        ];
        let ranked = rank(&query, candidates, 3);
        assert_eq!(ranked[0].0, 2);
        assert!((ranked[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rank_is_idempotent() {
        let query = vec![1.0, 0.0];
        let candidates = vec![(1, vec![0.7, 0.7]), (2, vec![1.0, 0.1]), (3, vec![0.0, 1.0])];
        let first = rank(&query, candidates.clone(), 3);
        let second = rank(&query, candidates, 3);
        let ids1: Vec<i32> = first.iter().map(|(id, _)| *id).collect();
        let ids2: Vec<i32> = second.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids1, ids2);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.1, b.1);
        }
    }

    #[test]
    fn rank_ties_preserve_input_order() {
        let query = vec![1.0, 0.0];
        let same = vec![2.0, 0.0];
        let candidates = vec![(10, same.clone()), (20, same.clone()), (30, same)];
        let ranked = rank(&query, candidates, 3);
        let ids: Vec<i32> = ranked.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn rank_k_larger_than_candidates_returns_all() {
        let query = vec![1.0];
        let ranked = rank(&query, vec![(1, vec![1.0]), (2, vec![-1.0])], 100);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn rank_empty_candidates_returns_empty() {
        let ranked: Vec<(i64, f32)> = rank(&[1.0, 0.0], Vec::new(), 5);
        assert!(ranked.is_empty());
    }
}
