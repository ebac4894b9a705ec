//! # Ragline
//!
//! **A document ingestion and retrieval engine.**
//!
//! Ragline turns uploaded documents into searchable vector indexes: bytes
//! go into content storage, text is extracted and split into overlapping
//! chunks, chunks are embedded through a remote provider, and retrieval
//! ranks every stored chunk against the query by cosine similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────────────────────┐   ┌──────────┐
//! │  Upload  │──▶│  Pipeline                  │──▶│  SQLite   │
//! │  (CLI)   │   │ Extract ▸ Chunk ▸ Embed    │   │  chunks   │
//! └──────────┘   └────────────────────────────┘   └────┬─────┘
//!                      ▲                               │
//!                ┌─────┴─────┐                    ┌────▼─────┐
//!                │ Job queue │                    │  Search  │
//!                │ + workers │                    │ (cosine) │
//!                └───────────┘                    └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. An upload is accepted only after its preconditions hold: the target
//!    collection exists in the caller's org and is under capacity, and
//!    the raw bytes land in **content storage** ([`storage`]) first.
//! 2. A document record is created `pending` and either processed
//!    **inline** under a wall-clock budget or handed to the **job queue**
//!    ([`queue`], [`worker`]) and processed asynchronously.
//! 3. The pipeline ([`ingest`]) extracts text ([`extract`]), splits it
//!    with the sliding-window chunker, embeds each chunk through the
//!    remote provider ([`embedding`]), and appends the chunk rows in one
//!    transaction.
//! 4. Document status walks the lifecycle state machine
//!    (`pending → queued → processing → completed | failed`); every
//!    pipeline failure is recovered into a `failed` status with a reason.
//! 5. Retrieval ([`search`]) embeds the query and brute-force ranks all
//!    chunks in the requested collections by cosine similarity.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`storage`] | Content storage boundary: filesystem-backed blob store |
//! | [`extract`] | Text extraction: plain text, Markdown, PDF, DOCX |
//! | [`embedding`] | Remote embedding client with retry and backoff |
//! | [`queue`] | Job queue boundary and in-process implementation |
//! | [`ingest`] | Ingestion orchestrator: preconditions, pipeline, lifecycle |
//! | [`worker`] | Worker pool draining the job queue |
//! | [`search`] | Query embedding + brute-force cosine retrieval |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod queue;
pub mod search;
pub mod sqlite_store;
pub mod storage;
pub mod worker;

pub use ragline_core::chunk::ChunkPolicy;
pub use ragline_core::embedder::Embedder;
pub use ragline_core::error::PipelineError;
pub use ragline_core::models::{Document, DocumentStatus, SearchHit};
pub use ragline_core::store::Store;
