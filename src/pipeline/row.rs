use std::sync::Arc;

use crate::core::config::settings::{LlmSettings, RetrievalSettings};
use crate::core::errors::ApiError;
use crate::llm::types::ChatRequest;
use crate::llm::LlmClient;
use crate::pipeline::prompt::PromptBuilder;
use crate::pipeline::types::{Row, RowResult};
use crate::rag::Retriever;

/// Runs the pipeline for a single row and converts every failure into a
/// row-scoped result. Nothing here can abort sibling rows.
pub struct RowProcessor {
    llm: Arc<dyn LlmClient>,
    retriever: Arc<Retriever>,
    prompts: PromptBuilder,
    top_k: usize,
    temperature: f64,
    max_tokens: Option<i32>,
}

impl RowProcessor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Arc<Retriever>,
        llm_settings: &LlmSettings,
        retrieval_settings: &RetrievalSettings,
    ) -> Self {
        Self {
            llm,
            retriever,
            prompts: PromptBuilder::new(),
            top_k: retrieval_settings.top_k.max(1),
            temperature: llm_settings.temperature,
            max_tokens: llm_settings.max_tokens,
        }
    }

    pub async fn process(&self, row: &Row, history: &[String]) -> RowResult {
        if row.requirement.trim().is_empty() {
            return RowResult::skipped(row);
        }

        match self.generate(row, history).await {
            Ok(text) => RowResult::success(row, text.trim().to_string()),
            Err(err) => {
                tracing::warn!("row {} failed: {}", row.position, err);
                RowResult::fail(row, err.to_string())
            }
        }
    }

    async fn generate(&self, row: &Row, history: &[String]) -> Result<String, ApiError> {
        let embedding = self.llm.embed(&row.requirement).await?;
        let retrieval = self.retriever.retrieve(&embedding, self.top_k).await?;

        let messages = self.prompts.build(row, &retrieval.passages, history);
        let mut request = ChatRequest::new(messages);
        request.temperature = Some(self.temperature);
        request.max_tokens = self.max_tokens;

        self.llm.complete(request).await
    }
}
