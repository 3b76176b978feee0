pub mod client;
pub mod openai;
pub mod types;

pub use client::LlmClient;
pub use openai::OpenAiClient;
pub use types::{ChatMessage, ChatRequest};
