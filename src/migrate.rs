use anyhow::Result;
use sqlx::SqlitePool;

/// Create all tables. Idempotent: safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // File artifacts. storage_key is the idempotence key for upload events.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            storage_key TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            file_type TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Conversation turns, append-only.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            file_id TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            text TEXT NOT NULL,
            is_user INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (file_id) REFERENCES files(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedded text units, namespaced by file identity. Vectors are
    // little-endian f32 blobs.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vector_records (
            id TEXT PRIMARY KEY,
            namespace TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            UNIQUE(namespace, ordinal)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_file_created ON messages(file_id, created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vector_records_ns ON vector_records(namespace)")
        .execute(pool)
        .await?;

    Ok(())
}
