//! Vector index over SQLite, partitioned by namespace.
//!
//! All records for one file share the namespace equal to the file identity,
//! so retrieval is scoped per-file with no cross-file leakage. Writes are
//! transactional at file granularity: either every unit of an ingestion
//! attempt is indexed or none are.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{self, Embedder};
use crate::error::IngestError;
use crate::models::{Passage, TextUnit};

/// Embed every unit and write the records into `namespace`.
///
/// Any previous records in the namespace (from a failed earlier attempt)
/// are replaced in the same transaction, so a retry never leaves a mixed
/// index. Embedding and write failures map to [`IngestError::Indexing`];
/// the orchestrator is responsible for the FAILED status transition.
pub async fn index_units(
    pool: &SqlitePool,
    namespace: &str,
    units: &[TextUnit],
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<(), IngestError> {
    let batch_size = batch_size.max(1);

    tracing::debug!(
        namespace,
        model = embedder.model_name(),
        units = units.len(),
        "indexing units"
    );

    // Embed first: an embedding failure must not touch the index.
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(units.len());
    for batch in units.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|u| u.text.clone()).collect();
        let embedded = embedder
            .embed(&texts)
            .await
            .map_err(|e| IngestError::Indexing(e.to_string()))?;
        if embedded.len() != batch.len() {
            return Err(IngestError::Indexing(format!(
                "embedding count mismatch: {} texts, {} vectors",
                batch.len(),
                embedded.len()
            )));
        }
        if let Some(bad) = embedded.iter().find(|v| v.len() != embedder.dims()) {
            return Err(IngestError::Indexing(format!(
                "embedding dimension mismatch: {} expected {}, got {}",
                embedder.model_name(),
                embedder.dims(),
                bad.len()
            )));
        }
        vectors.extend(embedded);
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| IngestError::Indexing(e.to_string()))?;

    sqlx::query("DELETE FROM vector_records WHERE namespace = ?")
        .bind(namespace)
        .execute(&mut *tx)
        .await
        .map_err(|e| IngestError::Indexing(e.to_string()))?;

    for (unit, vector) in units.iter().zip(vectors.iter()) {
        sqlx::query(
            r#"
            INSERT INTO vector_records (id, namespace, ordinal, text, metadata_json, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(namespace)
        .bind(unit.ordinal)
        .bind(&unit.text)
        .bind(&unit.metadata_json)
        .bind(embedding::vec_to_blob(vector))
        .execute(&mut *tx)
        .await
        .map_err(|e| IngestError::Indexing(e.to_string()))?;
    }

    tx.commit()
        .await
        .map_err(|e| IngestError::Indexing(e.to_string()))?;

    Ok(())
}

/// Return the top-`k` records most similar to `question`, restricted to
/// `namespace`, in descending similarity order.
pub async fn query(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    namespace: &str,
    question: &str,
    k: usize,
) -> Result<Vec<Passage>> {
    let query_vec = embedding::embed_query(embedder, question).await?;

    let rows = sqlx::query(
        "SELECT ordinal, text, metadata_json, embedding FROM vector_records WHERE namespace = ?",
    )
    .bind(namespace)
    .fetch_all(pool)
    .await?;

    let mut passages: Vec<Passage> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            Passage {
                ordinal: row.get("ordinal"),
                text: row.get("text"),
                metadata_json: row.get("metadata_json"),
                score: embedding::cosine_similarity(&query_vec, &vec) as f64,
            }
        })
        .collect();

    passages.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.ordinal.cmp(&b.ordinal))
    });
    passages.truncate(k);

    Ok(passages)
}
