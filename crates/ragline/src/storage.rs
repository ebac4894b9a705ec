//! Content storage boundary.
//!
//! Raw document bytes live outside the database, behind the
//! [`ContentStorage`] trait. The upload path writes bytes here *before*
//! creating the document record, so a storage failure leaves no
//! dangling document behind. The pipeline reads the bytes back by the
//! opaque `content_ref` stored on the document.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage write failed: {0}")]
    Write(String),
    #[error("storage read failed for {content_ref}: {message}")]
    Read {
        content_ref: String,
        message: String,
    },
    #[error("content not found: {0}")]
    NotFound(String),
}

/// Blob storage for uploaded document content.
#[async_trait]
pub trait ContentStorage: Send + Sync {
    /// Persist `bytes` and return an opaque content reference.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Read back the bytes behind a content reference.
    async fn get(&self, content_ref: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove the bytes behind a content reference, if present.
    async fn delete(&self, content_ref: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed content storage.
///
/// Content-addressed: the reference is `sha256/<hex digest>`, so
/// identical uploads share one blob and writes are idempotent.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, content_ref: &str) -> Option<PathBuf> {
        let digest = content_ref.strip_prefix("sha256/")?;
        // The reference must stay inside the storage root.
        if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(self.root.join(digest))
    }
}

#[async_trait]
impl ContentStorage for FsStorage {
    async fn put(&self, _name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let digest = hex::encode(Sha256::digest(bytes));
        let content_ref = format!("sha256/{digest}");

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;
        let path = self.root.join(&digest);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;

        Ok(content_ref)
    }

    async fn get(&self, content_ref: &str) -> Result<Vec<u8>, StorageError> {
        let path = self
            .path_for(content_ref)
            .ok_or_else(|| StorageError::NotFound(content_ref.to_string()))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(content_ref.to_string()))
            }
            Err(e) => Err(StorageError::Read {
                content_ref: content_ref.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn delete(&self, content_ref: &str) -> Result<(), StorageError> {
        let path = self
            .path_for(content_ref)
            .ok_or_else(|| StorageError::NotFound(content_ref.to_string()))?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Write(e.to_string())),
        }
    }
}
