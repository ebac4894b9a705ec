use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ragline_core::chunk::ChunkPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Connection pool size. Needs headroom for workers writing chunk
    /// rows while the CLI reads status and search results.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

fn default_db_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for stored document content.
    pub root: PathBuf,
    #[serde(default = "default_put_timeout_secs")]
    pub put_timeout_secs: u64,
}

fn default_put_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

impl ChunkingConfig {
    pub fn policy(&self) -> Result<ChunkPolicy> {
        ChunkPolicy::new(self.size, self.overlap)
            .map_err(|e| anyhow::anyhow!("invalid chunking config: {e}"))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"forge"` (any OpenAI-compatible endpoint).
    pub provider: String,
    pub model: String,
    pub dims: usize,
    /// Endpoint override; required for the `forge` provider.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extra attempts after the first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    1000
}
fn default_embed_timeout_secs() -> u64 {
    30
}

/// How uploads are processed: synchronously or through the job queue.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    Inline,
    Queue,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_mode")]
    pub mode: IngestMode,
    #[serde(default = "default_inline_timeout_secs")]
    pub inline_timeout_secs: u64,
    /// Total attempts per queued job, first run included.
    #[serde(default = "default_job_attempts")]
    pub job_attempts: u32,
    #[serde(default = "default_job_backoff_ms")]
    pub job_backoff_ms: u64,
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    /// Maximum documents per collection; unset means unlimited.
    #[serde(default)]
    pub collection_capacity: Option<i64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            inline_timeout_secs: default_inline_timeout_secs(),
            job_attempts: default_job_attempts(),
            job_backoff_ms: default_job_backoff_ms(),
            worker_concurrency: default_worker_concurrency(),
            collection_capacity: None,
        }
    }
}

fn default_mode() -> IngestMode {
    IngestMode::Inline
}
fn default_inline_timeout_secs() -> u64 {
    30
}
fn default_job_attempts() -> u32 {
    5
}
fn default_job_backoff_ms() -> u64 {
    2000
}
fn default_worker_concurrency() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

impl IngestConfig {
    pub fn inline_timeout(&self) -> Duration {
        Duration::from_secs(self.inline_timeout_secs)
    }

    pub fn job_backoff(&self) -> Duration {
        Duration::from_millis(self.job_backoff_ms)
    }
}

impl StorageConfig {
    pub fn put_timeout(&self) -> Duration {
        Duration::from_secs(self.put_timeout_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate db
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be >= 1");
    }

    // Validate chunking
    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.size ({})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    // Validate embedding
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.model.is_empty() {
        anyhow::bail!("embedding.model must not be empty");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" => {}
        "forge" => {
            if config.embedding.base_url.is_none() {
                anyhow::bail!("embedding.base_url is required when provider is 'forge'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or forge.",
            other
        ),
    }

    // Validate ingest
    if config.ingest.job_attempts == 0 {
        anyhow::bail!("ingest.job_attempts must be >= 1");
    }
    if config.ingest.worker_concurrency == 0 {
        anyhow::bail!("ingest.worker_concurrency must be >= 1");
    }
    if let Some(cap) = config.ingest.collection_capacity {
        if cap < 1 {
            anyhow::bail!("ingest.collection_capacity must be >= 1 when set");
        }
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    Ok(config)
}
