//! LLM integration layer.
//!
//! - [`types`] -- Core data types (messages, tool calls, tool definitions).
//! - [`client`] -- HTTP client for the Anthropic and OpenAI APIs.
//!
//! The orchestrator only talks to the [`LanguageModel`] trait, so tests and
//! alternative backends can stand in for [`LlmClient`].

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

// Re-export the most commonly used types for convenience.
pub use client::{LlmClient, LlmClientConfig, LlmProvider};
pub use types::{
    ChatRequest, CompletionOptions, LlmResponse, Message, Role, ToolCall, ToolDefinition,
};

/// The language-model collaborator consumed by the turn orchestrator and the
/// result summarizer.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Whether the model has credentials and may be called at all.
    fn is_configured(&self) -> bool;

    /// Run one completion.  `tools` is `None` when tool use is not offered.
    async fn chat_completion(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: CompletionOptions,
    ) -> Result<LlmResponse>;
}
