//! Sliding-window text chunker.
//!
//! Splits extracted document text into overlapping windows of a fixed
//! character size. Window `i` covers
//! `[i·(size-overlap), i·(size-overlap)+size)` in character offsets;
//! the last partial window is kept if it is non-empty after trimming,
//! and whitespace-only windows are dropped entirely (they never consume
//! a chunk index).
//!
//! The `overlap < size` precondition is enforced when a [`ChunkPolicy`]
//! is constructed, so a policy that exists cannot loop forever.

use thiserror::Error;

/// Error building an invalid chunking policy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkPolicyError {
    #[error("chunk size must be > 0")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Validated chunking parameters.
///
/// Construction is the guard for the sliding-window precondition:
/// `overlap < size` and `size > 0`. Splitting itself is pure and
/// deterministic — the same text and policy always produce the same
/// chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    size: usize,
    overlap: usize,
}

impl ChunkPolicy {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkPolicyError> {
        if size == 0 {
            return Err(ChunkPolicyError::ZeroSize);
        }
        if overlap >= size {
            return Err(ChunkPolicyError::OverlapTooLarge { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered, trimmed, non-empty windows.
    ///
    /// Offsets are character offsets, so multi-byte UTF-8 input can never
    /// split inside a code point. Returns an empty vector for empty or
    /// whitespace-only input.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let end = (start + self.size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}
