//! Upstream completion API: provider trait and the OpenRouter client

pub mod openrouter;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Result;
use crate::types::ChatMessage;

pub use openrouter::OpenRouterClient;
pub use prompt::build_system_prompt;

/// One chat turn as handed to a provider: the assembled system prompt plus
/// the ordered conversation history.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

/// A model offered by the upstream API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// Stream of completion text deltas
pub type ChunkStream = ReceiverStream<Result<String>>;

/// Trait over chat-completion backends
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion and return the full reply
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Run one completion, streaming text deltas as they arrive
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChunkStream>;

    /// Models available upstream
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Whether the upstream API is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
