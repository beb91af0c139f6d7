//! Grounding prompt assembly.
//!
//! Builds the model input from three parts: a system instruction restricting
//! the model to the given context and prior conversation, a role-tagged
//! transcript of recent turns, and the retrieved passages in rank order.

use serde::Serialize;

use crate::models::{Message, Passage};

/// Separates retrieved passages inside the context block.
const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

const SYSTEM_INSTRUCTION: &str = "You are answering questions about a document the user uploaded. \
Use only the provided context and the previous conversation to answer. \
If the answer is not in the context or conversation, say that you don't know. \
Answer in markdown.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in the chat-completions request schema.
#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// Assemble the grounding prompt for one question.
///
/// `history` must be ordered oldest-to-newest; `passages` must be in
/// retrieval-rank order.
pub fn build_prompt(
    question: &str,
    passages: &[Passage],
    history: &[Message],
) -> Vec<PromptMessage> {
    let mut transcript = String::new();
    for message in history {
        let speaker = if message.is_user { "User" } else { "Assistant" };
        transcript.push_str(speaker);
        transcript.push_str(": ");
        transcript.push_str(&message.text);
        transcript.push('\n');
    }

    let context = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR);

    let user_content = format!(
        "PREVIOUS CONVERSATION:\n{}\n\nCONTEXT:\n{}\n\nUSER INPUT: {}",
        transcript, context, question
    );

    vec![
        PromptMessage {
            role: Role::System,
            content: SYSTEM_INSTRUCTION.to_string(),
        },
        PromptMessage {
            role: Role::User,
            content: user_content,
        },
    ]
}
