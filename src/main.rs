//! # Embedsync CLI (`esy`)
//!
//! The `esy` binary is the primary interface for Embedsync. It provides
//! commands for database initialization, document writes, stale scanning,
//! queue draining, the autopilot scheduler, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! esy --config ./config/embedsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `esy init` | Create the SQLite database and run schema migrations |
//! | `esy put <id>` | Insert or update a document (fires the fast-path enqueue) |
//! | `esy get <id>` | Show a document and its embedding freshness |
//! | `esy delete <id>` | Delete a document and its embedding |
//! | `esy scan` | Find stale documents and enqueue regeneration jobs |
//! | `esy drain` | Run the drain loop once |
//! | `esy autopilot` | Run the periodic scan+drain scheduler |
//! | `esy status` | Show coverage, backlog, and recent errors |
//! | `esy serve` | Start the HTTP trigger/monitoring server |

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use embedsync::{
    autopilot, config, db, documents, drain, enqueue, migrate, queue, server, sidecar, status,
};

/// Embedsync CLI — keeps derived vector embeddings synchronized with mutable
/// source documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/embedsync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "esy",
    about = "Embedsync — keeps derived vector embeddings synchronized with mutable source documents",
    version,
    long_about = "Embedsync watches a document store for content changes, enqueues regeneration \
    jobs into a durable visibility-timeout queue, and drains that queue with an adaptive, \
    time-budgeted worker loop until every embedding matches its document's current content."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/embedsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// embeddings, jobs, processing_errors). Idempotent; running it multiple
    /// times is safe.
    Init,

    /// Insert or update a document.
    ///
    /// Recomputes the content fingerprint and, when the content changed,
    /// enqueues a regeneration job immediately (the trigger fast path).
    Put {
        /// Document identifier.
        id: String,

        /// Inline document content.
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read document content from a file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Optional metadata as a JSON object.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Show a document and its embedding freshness.
    Get {
        /// Document identifier.
        id: String,
    },

    /// Delete a document. Its sidecar embedding is removed by cascade.
    Delete {
        /// Document identifier.
        id: String,
    },

    /// Find stale documents and enqueue regeneration jobs.
    ///
    /// Skips documents that already have a job in flight. Useful for
    /// catching up after bulk imports or fast-path outages.
    Scan {
        /// Maximum number of stale documents to consider.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Run the drain loop once.
    ///
    /// Claims and processes queued jobs until the queue is empty or the time
    /// budget is spent, then reports throughput.
    Drain {
        /// Fixed batch size (default: adaptive from queue depth).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Time budget in seconds (default: from config).
        #[arg(long)]
        timeout_seconds: Option<u64>,
    },

    /// Run the periodic scan+drain scheduler until interrupted.
    Autopilot,

    /// Show coverage, backlog, and recent errors.
    Status,

    /// Start the HTTP trigger/monitoring server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized at {}", config.db.path.display());
            pool.close().await;
        }

        Commands::Put {
            id,
            content,
            file,
            metadata,
        } => {
            let body = match (content, file) {
                (Some(c), None) => c,
                (None, Some(path)) => std::fs::read_to_string(&path)?,
                (None, None) => bail!("Provide document content with --content or --file"),
                (Some(_), Some(_)) => unreachable!("clap conflicts_with"),
            };

            if let Some(ref m) = metadata {
                let parsed: serde_json::Value = serde_json::from_str(m)?;
                if !parsed.is_object() {
                    bail!("--metadata must be a JSON object");
                }
            }

            let pool = db::connect(&config).await?;
            let doc =
                documents::put_document(&pool, &config, &id, &body, metadata.as_deref()).await?;
            let pending = queue::has_pending(&pool, &id).await?;

            println!("put {}", doc.id);
            println!("  content length: {}", doc.content.len());
            println!("  fingerprint: {}", doc.content_hash);
            println!("  job pending: {}", pending);
            pool.close().await;
        }

        Commands::Get { id } => {
            let pool = db::connect(&config).await?;
            let Some(doc) = documents::get_document(&pool, &id).await? else {
                pool.close().await;
                bail!("Document not found: {}", id);
            };

            println!("id: {}", doc.id);
            println!("updated_at: {}", doc.updated_at);
            println!("fingerprint: {}", doc.content_hash);
            match sidecar::get_embedding(&pool, &id).await? {
                Some(emb) => {
                    let fresh = emb.content_hash == doc.content_hash;
                    println!(
                        "embedding: {} dims, {}",
                        emb.dims,
                        if fresh { "fresh" } else { "stale" }
                    );
                }
                None => println!("embedding: none"),
            }
            println!();
            println!("{}", doc.content);
            pool.close().await;
        }

        Commands::Delete { id } => {
            let pool = db::connect(&config).await?;
            let removed = documents::delete_document(&pool, &id).await?;
            if removed {
                println!("deleted {}", id);
            } else {
                println!("not found: {}", id);
            }
            pool.close().await;
        }

        Commands::Scan { limit } => {
            let pool = db::connect(&config).await?;
            let limit = limit.unwrap_or(config.enqueue.scan_limit);
            let enqueued = enqueue::enqueue_stale(&pool, &config, limit).await?;
            let depth = queue::size(&pool).await?;

            println!("scan");
            println!("  enqueued: {}", enqueued);
            println!("  queue size: {}", depth);
            pool.close().await;
        }

        Commands::Drain {
            batch_size,
            timeout_seconds,
        } => {
            let pool = db::connect(&config).await?;
            let opts = drain::DrainOptions {
                batch_size,
                time_budget: timeout_seconds.map(std::time::Duration::from_secs),
            };
            let report = drain::run_drain(&pool, &config, opts).await?;

            println!("drain");
            println!("  processed: {}", report.processed);
            println!("  errors: {}", report.errors);
            println!("  cycles: {}", report.cycles);
            println!("  elapsed: {} ms", report.processing_time_ms);
            println!(
                "  throughput: {:.1} jobs/s",
                report.throughput_per_second
            );
            pool.close().await;
        }

        Commands::Autopilot => {
            let pool = db::connect(&config).await?;
            autopilot::run_autopilot(&pool, &config).await?;
        }

        Commands::Status => {
            let pool = db::connect(&config).await?;
            let report = status::collect_status(&pool).await?;
            status::print_status(&report);
            pool.close().await;
        }

        Commands::Serve => {
            let pool = db::connect(&config).await?;
            server::run_server(&config, pool).await?;
        }
    }

    Ok(())
}
