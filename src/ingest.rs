//! Ingestion orchestration.
//!
//! Drives the per-artifact state machine for an upload-completion event:
//! dedup on storage key, create the artifact in PROCESSING before anything
//! else, then fetch → extract → quota-check → index, finishing in SUCCESS
//! or FAILED. Pipeline errors never propagate to the event producer — they
//! become the FAILED status and a log line. Different artifacts may ingest
//! concurrently; steps within one artifact are strictly sequential.

use std::time::Duration;

use anyhow::Result;
use sqlx::SqlitePool;
use tokio::time::timeout;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::IngestError;
use crate::extract;
use crate::index;
use crate::models::{FileType, UploadEvent, UploadStatus};
use crate::quota;
use crate::store;

/// Result of one upload event, for the event producer's ack and the CLI.
#[derive(Debug)]
pub enum IngestOutcome {
    /// An artifact with this storage key already exists; the duplicate
    /// event is a no-op.
    Deduplicated,
    Completed {
        file_id: String,
        status: UploadStatus,
        units: usize,
    },
}

/// Process one upload-completion event to a terminal state.
///
/// Only record-store failures return `Err`; everything that goes wrong in
/// the pipeline itself is absorbed into a FAILED artifact.
pub async fn run_ingest(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn Embedder,
    event: &UploadEvent,
) -> Result<IngestOutcome> {
    // Dedup guard against duplicate delivery of the same upload event.
    if store::find_file_by_key(pool, &event.storage_key)
        .await?
        .is_some()
    {
        tracing::debug!(key = %event.storage_key, "duplicate upload event, skipping");
        return Ok(IngestOutcome::Deduplicated);
    }

    // The PROCESSING row is the durable marker that ingestion started; it
    // must exist before extraction so a crash leaves a recoverable record.
    let Some(file) = store::create_file(
        pool,
        &event.storage_key,
        &event.name,
        &event.owner_id,
        &event.declared_type,
    )
    .await?
    else {
        // A concurrent event for the same key won the insert.
        return Ok(IngestOutcome::Deduplicated);
    };

    tracing::info!(file_id = %file.id, key = %event.storage_key, r#type = %event.declared_type, "ingestion started");

    match run_pipeline(pool, config, embedder, &file.id, event).await {
        Ok(units) => {
            store::update_file_status(pool, &file.id, UploadStatus::Success).await?;
            tracing::info!(file_id = %file.id, units, "ingestion succeeded");
            Ok(IngestOutcome::Completed {
                file_id: file.id,
                status: UploadStatus::Success,
                units,
            })
        }
        Err(e) => {
            // Detail stays in the logs; the user sees only the status flag.
            tracing::warn!(file_id = %file.id, error = %e, "ingestion failed");
            store::update_file_status(pool, &file.id, UploadStatus::Failed).await?;
            Ok(IngestOutcome::Completed {
                file_id: file.id,
                status: UploadStatus::Failed,
                units: 0,
            })
        }
    }
}

/// EXTRACTING → QUOTA_CHECK → INDEXING, with a bounded timeout on each
/// external call.
async fn run_pipeline(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn Embedder,
    file_id: &str,
    event: &UploadEvent,
) -> Result<usize, IngestError> {
    let url = format!(
        "{}/{}",
        config.blob.base_url.trim_end_matches('/'),
        event.storage_key
    );
    let bytes = timeout(
        Duration::from_secs(config.ingest.fetch_timeout_secs),
        fetch_blob(&url),
    )
    .await
    .map_err(|_| IngestError::Extraction(format!("blob fetch timed out: {}", url)))??;

    // Parsing is CPU-bound; keep it off the async workers.
    let declared = event.declared_type.clone();
    let units = timeout(
        Duration::from_secs(config.ingest.step_timeout_secs),
        tokio::task::spawn_blocking(move || extract::extract_units(&bytes, &declared)),
    )
    .await
    .map_err(|_| IngestError::Extraction("extraction timed out".to_string()))?
    .map_err(|e| IngestError::Extraction(format!("extraction task failed: {}", e)))??;

    // Extraction succeeded, so the declared type is in the closed set.
    let quota_applies = FileType::parse(&event.declared_type)
        .map(|t| t.quota_applies())
        .unwrap_or(false);
    if quota_applies {
        let plan = config.plans.resolve(event.is_subscribed);
        let decision = quota::evaluate(units.len(), &plan);
        if !decision.allowed {
            return Err(IngestError::QuotaExceeded {
                units: units.len(),
                limit: decision.limit,
            });
        }
    }

    timeout(
        Duration::from_secs(config.ingest.step_timeout_secs),
        index::index_units(pool, file_id, &units, embedder, config.embedding.batch_size),
    )
    .await
    .map_err(|_| IngestError::Indexing("indexing timed out".to_string()))??;

    Ok(units.len())
}

async fn fetch_blob(url: &str) -> Result<Vec<u8>, IngestError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| IngestError::Extraction(format!("blob fetch failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::Extraction(format!(
            "blob fetch failed: {} returned {}",
            url, status
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| IngestError::Extraction(format!("blob read failed: {}", e)))?;

    Ok(bytes.to_vec())
}
