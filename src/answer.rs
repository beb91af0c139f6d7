//! Retrieval-augmented answer engine.
//!
//! One call per chat request: persist the user turn, retrieve passages,
//! assemble the grounding prompt, stream model output to the caller, and
//! persist exactly one assistant turn once the stream completes.
//!
//! Fragments are forwarded as they arrive; the full answer is never
//! buffered ahead of the first byte reaching the caller. If the caller
//! disconnects mid-stream, upstream consumption stops and no assistant
//! message is persisted — the next conversation load reconciles from the
//! persisted list.

use futures::StreamExt;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::ChatError;
use crate::index;
use crate::llm::{FragmentStream, LanguageModel};
use crate::prompt;
use crate::store;

/// Answer a question about a file, returning a live fragment stream.
///
/// Fails with [`ChatError::NotFound`] when the file does not exist or is
/// not owned by the caller — deliberately indistinguishable. The incoming
/// user message is persisted before any retrieval or model call.
pub async fn answer(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    llm: Arc<dyn LanguageModel>,
    retrieval: &RetrievalConfig,
    owner_id: &str,
    file_id: &str,
    question: &str,
) -> Result<FragmentStream, ChatError> {
    let file = store::find_file(pool, file_id, owner_id)
        .await
        .map_err(|e| ChatError::Persistence(e.to_string()))?
        .ok_or(ChatError::NotFound)?;

    // The transcript used by the next turn must include this one even if
    // the model call below fails.
    store::create_message(pool, &file.id, owner_id, question, true)
        .await
        .map_err(|e| ChatError::Persistence(e.to_string()))?;

    let passages = index::query(pool, embedder, &file.id, question, retrieval.top_k)
        .await
        .map_err(|e| ChatError::Stream(e.to_string()))?;

    // The window is loaded after the insert above, so the current question
    // appears both as the newest transcript line and as the input line of
    // the prompt. Deliberate: the transcript stays a faithful snapshot of
    // the persisted conversation.
    let mut history = store::list_recent_messages(pool, &file.id, retrieval.history_limit)
        .await
        .map_err(|e| ChatError::Persistence(e.to_string()))?;
    // listRecent returns newest first; the prompt wants oldest first.
    history.reverse();

    let messages = prompt::build_prompt(question, &passages, &history);
    let upstream = llm.complete_stream(&messages).await?;

    Ok(forward_and_persist(
        pool.clone(),
        file.id,
        owner_id.to_string(),
        upstream,
    ))
}

/// Forward fragments to the caller and persist the assistant turn.
///
/// Persistence happens after the final fragment and before the stream
/// closes, so a consumer that drained the stream observes the stored turn.
/// A send failure means the caller went away: stop pulling from the model
/// and skip persistence.
fn forward_and_persist(
    pool: SqlitePool,
    file_id: String,
    owner_id: String,
    mut upstream: FragmentStream,
) -> FragmentStream {
    let (tx, rx) = mpsc::channel::<Result<String, ChatError>>(16);

    tokio::spawn(async move {
        let mut full = String::new();

        while let Some(item) = upstream.next().await {
            match item {
                Ok(fragment) => {
                    full.push_str(&fragment);
                    if tx.send(Ok(fragment)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    // Mid-stream failure: terminate without persisting a
                    // partial assistant message.
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }

        if let Err(e) = store::create_message(&pool, &file_id, &owner_id, &full, false).await {
            // Already-streamed content is not retracted; the lost turn is
            // only observable on the next conversation load.
            tracing::error!(file_id = %file_id, error = %e, "failed to persist assistant message");
        }
    });

    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}
