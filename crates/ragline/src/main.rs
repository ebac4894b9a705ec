//! # Ragline CLI
//!
//! The `ragline` binary drives the ingestion and retrieval engine:
//! database initialization, document upload, search, worker processing,
//! and document lifecycle management.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragline init` | Create the SQLite database and run schema migrations |
//! | `ragline collection create <name>` | Create a collection in the org |
//! | `ragline collection list` | List the org's collections |
//! | `ragline ingest <file>` | Upload and index a document |
//! | `ragline search "<query>"` | Rank stored chunks against a query |
//! | `ragline status [id]` | Show document status (one or all) |
//! | `ragline retry <id>` | Retry a failed document |
//! | `ragline delete <id>` | Delete a document and its chunks |
//! | `ragline worker` | Process queued documents until drained |
//!
//! ## Examples
//!
//! ```bash
//! ragline init --config ./ragline.toml
//! ragline collection create handbook --org acme
//! ragline ingest ./docs/onboarding.pdf --collection 1 --org acme
//! ragline search "vacation policy" --collection 1 --org acme
//! ragline status --org acme
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragline::config::{load_config, Config};
use ragline::embedding::RemoteEmbedder;
use ragline::extract;
use ragline::ingest::{IngestService, Upload};
use ragline::queue::{IngestJob, JobQueue, MemoryJobQueue};
use ragline::sqlite_store::SqliteStore;
use ragline::storage::FsStorage;
use ragline::worker::WorkerPool;
use ragline::{db, migrate, search};
use ragline_core::models::DocumentStatus;
use ragline_core::store::Store;

/// Ragline — a document ingestion and retrieval engine.
#[derive(Parser)]
#[command(
    name = "ragline",
    about = "Ragline — chunk, embed, and search your documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./ragline.toml")]
    config: PathBuf,

    /// Organization slug scoping collections and documents.
    #[arg(long, global = true, default_value = "default")]
    org: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Manage collections.
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Upload a document and index it.
    ///
    /// Inline mode processes the document before returning; queue mode
    /// returns once the job is enqueued (run `ragline worker` to drain).
    Ingest {
        /// Path to the file to upload (.txt, .md, .pdf, .docx).
        file: PathBuf,

        /// Target collection id.
        #[arg(long)]
        collection: Option<i64>,

        /// Override the MIME type guessed from the file extension.
        #[arg(long)]
        mime: Option<String>,
    },

    /// Search stored chunks by semantic similarity.
    Search {
        /// The query text.
        query: String,

        /// Collection ids to search (repeatable).
        #[arg(long = "collection", required = true)]
        collections: Vec<i64>,

        /// Maximum number of results.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Show document status.
    Status {
        /// Document id; omit to list all documents in the org.
        id: Option<i64>,
    },

    /// Retry a failed document.
    Retry { id: i64 },

    /// Delete a document, its chunks, and its stored content.
    Delete { id: i64 },

    /// Process queued documents until the backlog is drained.
    Worker,
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Create a collection.
    Create { name: String },
    /// List collections in the org.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", config.db.path.display());
        }
        Commands::Collection { action } => {
            let store = open_store(&config).await?;
            match action {
                CollectionAction::Create { name } => {
                    let coll = store.create_collection(&name, &cli.org).await?;
                    println!("Created collection {} (id {})", coll.name, coll.id);
                }
                CollectionAction::List => {
                    let collections = store.collections_for_org(&cli.org).await?;
                    if collections.is_empty() {
                        println!("No collections in org '{}'", cli.org);
                    }
                    for coll in collections {
                        println!("{:>6}  {}", coll.id, coll.name);
                    }
                }
            }
        }
        Commands::Ingest {
            file,
            collection,
            mime,
        } => {
            let app = App::build(&config).await?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();
            let mime_type = match mime {
                Some(m) => m,
                None => extract::mime_for_path(&file)
                    .with_context(|| format!("cannot guess MIME type for {}", file.display()))?
                    .to_string(),
            };
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let (document_id, status) = app
                .service
                .ingest(Upload {
                    name,
                    mime_type,
                    bytes,
                    collection_id: collection,
                    org_slug: cli.org.clone(),
                })
                .await?;

            if status == DocumentStatus::Failed {
                report_terminal(app.store.as_ref(), document_id).await?;
            } else {
                println!("Document {} is {}", document_id, status);
            }
        }
        Commands::Search {
            query,
            collections,
            top_k,
        } => {
            let app = App::build(&config).await?;
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            let hits = search::search(
                app.store.as_ref(),
                app.embedder.as_ref(),
                &query,
                &collections,
                top_k,
            )
            .await?;

            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                let preview: String = hit.content.chars().take(120).collect();
                println!("{:>2}. [{:.4}] doc {}  {}", i + 1, hit.score, hit.document_id, preview);
            }
        }
        Commands::Status { id } => {
            let store = open_store(&config).await?;
            match id {
                Some(id) => {
                    let doc = store
                        .get_document(id)
                        .await?
                        .with_context(|| format!("document {id} not found"))?;
                    println!("{:>6}  {:<12} {}", doc.id, doc.status.to_string(), doc.name);
                    if let Some(reason) = doc.failure_reason {
                        println!("        reason: {reason}");
                    }
                }
                None => {
                    let docs = store.documents_for_org(&cli.org).await?;
                    if docs.is_empty() {
                        println!("No documents in org '{}'", cli.org);
                    }
                    for doc in docs {
                        println!("{:>6}  {:<12} {}", doc.id, doc.status.to_string(), doc.name);
                    }
                }
            }
        }
        Commands::Retry { id } => {
            let app = App::build(&config).await?;
            let status = app.service.retry(id).await?;
            if status == DocumentStatus::Queued {
                // The in-process queue dies with this process, so drain it.
                app.queue.close();
                app.pool.run().await;
                report_terminal(app.store.as_ref(), id).await?;
            } else {
                report_terminal(app.store.as_ref(), id).await?;
            }
        }
        Commands::Delete { id } => {
            let app = App::build(&config).await?;
            app.service.delete(id).await?;
            println!("Deleted document {id}");
        }
        Commands::Worker => {
            let app = App::build(&config).await?;
            let queued = app.store.documents_with_status(DocumentStatus::Queued).await?;
            if queued.is_empty() {
                println!("No queued documents.");
                return Ok(());
            }
            println!("Processing {} queued document(s)...", queued.len());
            for doc in &queued {
                app.queue.enqueue(IngestJob::new(doc.id)).await?;
            }
            app.queue.close();
            app.pool.run().await;
            for doc in &queued {
                report_terminal(app.store.as_ref(), doc.id).await?;
            }
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    Ok(SqliteStore::new(pool))
}

/// Wired-up application: store, storage, embedder, queue, service, pool.
struct App {
    store: Arc<SqliteStore>,
    embedder: Arc<RemoteEmbedder>,
    queue: Arc<MemoryJobQueue>,
    service: Arc<IngestService>,
    pool: WorkerPool,
}

impl App {
    async fn build(config: &Config) -> Result<Self> {
        let db_pool = db::connect(config).await?;
        migrate::run_migrations(&db_pool).await?;

        let store = Arc::new(SqliteStore::new(db_pool));
        let storage = Arc::new(FsStorage::new(config.storage.root.clone()));
        let embedder = Arc::new(RemoteEmbedder::from_config(&config.embedding)?);
        let queue = Arc::new(MemoryJobQueue::new());

        let service = Arc::new(IngestService::new(
            store.clone(),
            storage,
            embedder.clone(),
            queue.clone(),
            config.chunking.policy()?,
            &config.ingest,
            config.storage.put_timeout(),
        ));

        let pool = WorkerPool::new(service.clone(), queue.clone(), &config.ingest);

        Ok(Self {
            store,
            embedder,
            queue,
            service,
            pool,
        })
    }
}

async fn report_terminal(store: &dyn Store, id: i64) -> Result<()> {
    let doc = store
        .get_document(id)
        .await?
        .with_context(|| format!("document {id} not found"))?;
    match doc.status {
        DocumentStatus::Failed => println!(
            "Document {} failed: {}",
            id,
            doc.failure_reason.unwrap_or_default()
        ),
        status => println!("Document {} is {}", id, status),
    }
    Ok(())
}
