//! File and message record stores over SQLite.
//!
//! The file store is idempotent on storage key: a duplicate upload event
//! creates nothing. Status updates are forward-only — a terminal row is
//! never moved back to PROCESSING.

use anyhow::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::models::{FileArtifact, Message, UploadStatus};

/// Create a file artifact in PROCESSING status.
///
/// Returns `None` when a row with the same storage key already exists
/// (including a concurrent create that won the race).
pub async fn create_file(
    pool: &SqlitePool,
    storage_key: &str,
    name: &str,
    owner_id: &str,
    declared_type: &str,
) -> Result<Option<FileArtifact>> {
    let id = Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().timestamp_millis();

    let result = sqlx::query(
        r#"
        INSERT INTO files (id, storage_key, name, file_type, owner_id, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(storage_key) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(storage_key)
    .bind(name)
    .bind(declared_type)
    .bind(owner_id)
    .bind(UploadStatus::Processing.as_str())
    .bind(created_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    Ok(Some(FileArtifact {
        id,
        storage_key: storage_key.to_string(),
        name: name.to_string(),
        declared_type: declared_type.to_string(),
        owner_id: owner_id.to_string(),
        status: UploadStatus::Processing,
        created_at,
    }))
}

pub async fn find_file_by_key(pool: &SqlitePool, storage_key: &str) -> Result<Option<FileArtifact>> {
    let row = sqlx::query("SELECT * FROM files WHERE storage_key = ?")
        .bind(storage_key)
        .fetch_optional(pool)
        .await?;
    row.map(|r| row_to_file(&r)).transpose()
}

/// Owner-scoped lookup. A file owned by someone else is indistinguishable
/// from a missing one.
pub async fn find_file(pool: &SqlitePool, id: &str, owner_id: &str) -> Result<Option<FileArtifact>> {
    let row = sqlx::query("SELECT * FROM files WHERE id = ? AND owner_id = ?")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| row_to_file(&r)).transpose()
}

/// Move a PROCESSING artifact to a terminal status. A no-op on rows that
/// already reached SUCCESS or FAILED, or that were deleted concurrently.
pub async fn update_file_status(pool: &SqlitePool, id: &str, status: UploadStatus) -> Result<()> {
    sqlx::query("UPDATE files SET status = ? WHERE id = ? AND status = ?")
        .bind(status.as_str())
        .bind(id)
        .bind(UploadStatus::Processing.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn create_message(
    pool: &SqlitePool,
    file_id: &str,
    owner_id: &str,
    text: &str,
    is_user: bool,
) -> Result<Message> {
    let id = Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().timestamp_millis();

    sqlx::query(
        r#"
        INSERT INTO messages (id, file_id, owner_id, text, is_user, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(file_id)
    .bind(owner_id)
    .bind(text)
    .bind(is_user)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(Message {
        id,
        file_id: file_id.to_string(),
        owner_id: owner_id.to_string(),
        text: text.to_string(),
        is_user,
        created_at,
    })
}

/// The most recent `limit` messages for a file, newest first. rowid breaks
/// ties for same-millisecond inserts.
pub async fn list_recent_messages(
    pool: &SqlitePool,
    file_id: &str,
    limit: i64,
) -> Result<Vec<Message>> {
    let rows = sqlx::query(
        r#"
        SELECT id, file_id, owner_id, text, is_user, created_at
        FROM messages
        WHERE file_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(file_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_message).collect())
}

fn row_to_file(row: &SqliteRow) -> Result<FileArtifact> {
    let status_str: String = row.get("status");
    let status = UploadStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("invalid status in files row: {}", status_str))?;
    Ok(FileArtifact {
        id: row.get("id"),
        storage_key: row.get("storage_key"),
        name: row.get("name"),
        declared_type: row.get("file_type"),
        owner_id: row.get("owner_id"),
        status,
        created_at: row.get("created_at"),
    })
}

fn row_to_message(row: &SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        file_id: row.get("file_id"),
        owner_id: row.get("owner_id"),
        text: row.get("text"),
        is_user: row.get("is_user"),
        created_at: row.get("created_at"),
    }
}
