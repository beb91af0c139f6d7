//! SQLite connection pool for the docuchat stores.
//!
//! One database holds the file artifacts, the conversation turns, and the
//! vector records. WAL keeps background ingestion writers from blocking
//! chat reads; foreign keys are enforced so a message can never reference
//! a missing file artifact.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::DbConfig;

/// Open the pool for the configured database file, creating the file and
/// any missing parent directories on first use.
pub async fn connect(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db.path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db.path.display()))?;

    Ok(pool)
}
