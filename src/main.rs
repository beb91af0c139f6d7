//! # docuchat CLI
//!
//! The `docuchat` binary drives the document-chat core: database
//! initialization, manual ingestion of an uploaded file, and the HTTP
//! server that receives upload events and answers questions.
//!
//! ## Usage
//!
//! ```bash
//! docuchat --config ./config/docuchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docuchat init` | Create the SQLite database and run schema migrations |
//! | `docuchat ingest` | Ingest one uploaded file from the blob store |
//! | `docuchat serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! docuchat init --config ./config/docuchat.toml
//!
//! # Ingest a PDF that finished uploading under key "abc123"
//! docuchat ingest --key abc123 --name report.pdf --owner user_1 --type pdf
//!
//! # Same file for a subscribed owner (pro plan limits)
//! docuchat ingest --key abc123 --name report.pdf --owner user_1 --type pdf --subscribed
//!
//! # Start the server (requires DOCUCHAT_SESSION_SECRET and OPENAI_API_KEY)
//! docuchat serve --config ./config/docuchat.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docuchat::config;
use docuchat::db;
use docuchat::embedding;
use docuchat::ingest::{self, IngestOutcome};
use docuchat::migrate;
use docuchat::models::UploadEvent;
use docuchat::server;

/// docuchat CLI — ingestion and retrieval core for chatting with
/// uploaded documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docuchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docuchat",
    about = "docuchat — ingest uploaded documents and answer questions about them",
    version,
    long_about = "docuchat ingests uploaded documents (PDF, CSV, XLS, XLSX) into a \
    per-file vector index and answers questions about a file by retrieving the most \
    similar passages, assembling a grounded prompt with bounded conversation history, \
    and streaming the model's answer while persisting both turns."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docuchat.toml`. Database, server, blob store,
    /// retrieval, embedding, model, and plan settings are read from this file.
    #[arg(long, global = true, default_value = "./config/docuchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (files, messages, vector_records). This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Ingest one uploaded file.
    ///
    /// Fetches the blob from the configured blob store, extracts text
    /// units, checks the plan quota, embeds, and indexes. Equivalent to
    /// the server receiving an upload-completion event. Requires
    /// `OPENAI_API_KEY`.
    Ingest {
        /// Storage key of the uploaded blob.
        #[arg(long)]
        key: String,

        /// Display name of the file (e.g. `report.pdf`).
        #[arg(long)]
        name: String,

        /// Owner user id.
        #[arg(long)]
        owner: String,

        /// Declared file type: `pdf`, `csv`, `xls`, or `xlsx`.
        #[arg(long = "type")]
        file_type: String,

        /// Owner has an active subscription (pro plan limits apply).
        #[arg(long)]
        subscribed: bool,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// upload-event and chat endpoints. Requires `DOCUCHAT_SESSION_SECRET`
    /// and `OPENAI_API_KEY`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docuchat=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            key,
            name,
            owner,
            file_type,
            subscribed,
        } => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool).await?;
            let embedder = embedding::create_embedder(&cfg.embedding)?;

            let event = UploadEvent {
                storage_key: key,
                name,
                owner_id: owner,
                declared_type: file_type,
                is_subscribed: subscribed,
            };

            match ingest::run_ingest(&pool, &cfg, embedder.as_ref(), &event).await? {
                IngestOutcome::Deduplicated => {
                    println!("Already ingested: a file with this storage key exists.");
                }
                IngestOutcome::Completed {
                    file_id,
                    status,
                    units,
                } => {
                    println!(
                        "Ingestion finished: file={} status={} units={}",
                        file_id,
                        status.as_str(),
                        units
                    );
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
