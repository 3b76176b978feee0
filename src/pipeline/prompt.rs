//! Prompt assembly.
//!
//! Deterministic given its arguments: the persona, the retrieved passages,
//! the bounded recent-answer history, and the row's own fields. Input text
//! is normalized here, at the prompt boundary only, so raw field values stay
//! intact for write-back and logging.

use crate::llm::types::ChatMessage;
use crate::pipeline::types::Row;

const PASSAGE_SEPARATOR: &str = "\n---\n";

const PERSONA: &str = "You are a proposal specialist answering RFP questionnaire requirements \
on behalf of the vendor. Write a clear, factual answer grounded in the reference material \
below, and do not claim capabilities the reference material does not support.";

/// Strips characters the downstream generation service may mishandle:
/// everything outside printable ASCII is dropped, keeping newlines and tabs.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| matches!(c, '\n' | '\t') || (c.is_ascii() && !c.is_ascii_control()))
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, row: &Row, passages: &[String], history: &[String]) -> Vec<ChatMessage> {
        let context_block = passages
            .iter()
            .map(|p| sanitize(p))
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR);

        let mut system = format!("{}\n\nReference material:\n{}", PERSONA, context_block);

        if !history.is_empty() {
            system.push_str(
                "\n\nAnswers already given earlier in this questionnaire; avoid repeating these:\n",
            );
            system.push_str(
                &history
                    .iter()
                    .map(|h| sanitize(h))
                    .collect::<Vec<_>>()
                    .join(PASSAGE_SEPARATOR),
            );
        }

        let mut user = sanitize(row.requirement.trim());
        if let Some(draft) = row.draft.as_deref() {
            if !draft.trim().is_empty() {
                user.push_str("\n\nExisting draft answer, provided as additional grounding:\n");
                user.push_str(&sanitize(draft));
            }
        }

        vec![
            ChatMessage {
                role: "system".to_string(),
                content: system,
            },
            ChatMessage {
                role: "user".to_string(),
                content: user,
            },
        ]
    }
}
