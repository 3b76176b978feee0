use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// check if the provider is healthy/reachable
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// embed a single input text into a fixed-dimension vector
    async fn embed(&self, input: &str) -> Result<Vec<f32>, ApiError>;

    /// chat completion (non-streaming)
    async fn complete(&self, request: ChatRequest) -> Result<String, ApiError>;
}
