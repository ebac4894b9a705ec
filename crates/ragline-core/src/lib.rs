//! # Ragline Core
//!
//! Shared, I/O-free logic for Ragline: data models, the document status
//! state machine, text chunking, cosine ranking, the store abstraction,
//! and the embedder trait.
//!
//! This crate contains no tokio runtime, sqlx, network, or filesystem
//! dependencies. Everything here is deterministic and directly testable;
//! the `ragline` application crate supplies the SQLite store, the remote
//! embedding client, and the ingestion orchestration on top of it.

pub mod chunk;
pub mod embedder;
pub mod error;
pub mod models;
pub mod rank;
pub mod store;
