//! Language model provider abstraction and the OpenAI streaming
//! implementation.
//!
//! The [`LanguageModel`] trait yields a finite, non-restartable stream of
//! text fragments. The OpenAI implementation parses the chat-completions
//! SSE protocol with `eventsource-stream`; chunks without a text delta are
//! skipped, and the stream ends at the `[DONE]` sentinel. Dropping the
//! stream stops consuming upstream model output.

use std::pin::Pin;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};

use crate::config::LlmConfig;
use crate::error::ChatError;
use crate::prompt::PromptMessage;

/// A live stream of partial answer text, terminating when the model
/// finishes generating.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Invoke the model in streaming mode with the assembled prompt.
    async fn complete_stream(&self, messages: &[PromptMessage])
        -> Result<FragmentStream, ChatError>;
}

/// OpenAI chat-completions client. Requires `OPENAI_API_KEY`.
pub struct OpenAiChatModel {
    model: String,
    temperature: f64,
    max_tokens: u32,
    timeout_secs: u64,
    base_url: String,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete_stream(
        &self,
        messages: &[PromptMessage],
    ) -> Result<FragmentStream, ChatError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ChatError::Stream("OPENAI_API_KEY not set".to_string()))?;

        // Connect timeout only: an overall timeout would cut long streams.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ChatError::Stream(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": true,
            "messages": messages,
        });

        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Stream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Stream(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        Ok(parse_sse_stream(response))
    }
}

enum SseItem {
    Done,
    Delta(Option<String>),
}

/// Parse a streaming chat-completions response into text fragments.
fn parse_sse_stream(response: reqwest::Response) -> FragmentStream {
    let events = response.bytes_stream().eventsource();

    let mapped = events
        .map(|result| match result {
            Ok(event) => {
                if event.data.trim() == "[DONE]" {
                    Ok(SseItem::Done)
                } else {
                    parse_chat_chunk(&event.data).map(SseItem::Delta)
                }
            }
            Err(e) => Err(ChatError::Stream(format!("SSE stream error: {}", e))),
        })
        .take_while(|item| futures::future::ready(!matches!(item, Ok(SseItem::Done))))
        .filter_map(|item| async move {
            match item {
                Ok(SseItem::Delta(Some(text))) => Some(Ok(text)),
                Ok(SseItem::Delta(None)) => None,
                Ok(SseItem::Done) => None,
                Err(e) => Some(Err(e)),
            }
        });

    Box::pin(mapped)
}

/// Extract the text delta from one chunk, if any. Role-only and empty
/// deltas yield `None`.
fn parse_chat_chunk(data: &str) -> Result<Option<String>, ChatError> {
    let json: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| ChatError::Stream(format!("failed to parse chunk: {}", e)))?;

    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str());

    Ok(content.filter(|c| !c.is_empty()).map(|c| c.to_string()))
}

/// Create the configured [`LanguageModel`].
pub fn create_language_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiChatModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
