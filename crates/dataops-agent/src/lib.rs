//! Turn orchestration core for DataOps Copilot.
//!
//! An operator talks to the copilot in natural language; each message is one
//! *turn*.  The [`TurnOrchestrator`] decides per turn whether to answer
//! directly, call one or more registry tools, stop for operator approval
//! before a mutating tool runs, or fall back to regex rules when no language
//! model is reachable.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────┐
//!   TurnRequest ─>│  TurnOrchestrator │─> TurnResponse
//!                 └─┬──────┬───────┬──┘
//!                   │      │       │
//!          ┌────────┴─┐ ┌──┴────┐ ┌┴────────────────┐
//!          │ LLM      │ │ Tool  │ │ ResultSummarizer│
//!          │ (trait)  │ │Registry │ + templates     │
//!          └──────────┘ └──┬────┘ └─────────────────┘
//!                   approval gate
//!                   rule fallback
//! ```
//!
//! ## Modules
//!
//! - [`registry`] -- Tool definitions bound to executors.
//! - [`approval`] -- The approval gate and pending actions.
//! - [`turn`] -- Request, response and history types.
//! - [`orchestrator`] -- The per-turn state machine.
//! - [`summarizer`] / [`templates`] -- Turning tool output into answers.
//! - [`fallback`] -- Regex rules used without a language model.
//! - [`poller`] -- Bounded submit-then-poll driver for remote jobs.
//! - [`llm`] -- Language model trait, wire types and HTTP client.
//! - [`config`] -- TOML and environment configuration.
//! - [`error`] -- Agent error types.

pub mod approval;
pub mod config;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod orchestrator;
pub mod poller;
pub mod registry;
pub mod summarizer;
pub mod templates;
pub mod turn;

// Re-export the most commonly used types at the crate root.
pub use approval::{PendingAction, needs_approval};
pub use config::DataOpsConfig;
pub use error::{AgentError, Result};
pub use fallback::{FallbackRule, RuleMatcher};
pub use llm::{
    CompletionOptions, LanguageModel, LlmClient, LlmClientConfig, LlmProvider, LlmResponse,
    Message, Role, ToolCall, ToolDefinition,
};
pub use orchestrator::TurnOrchestrator;
pub use poller::{Job, JobPoller, JobState, PollOutcome, PollerConfig};
pub use registry::{ToolExecutor, ToolRegistry, ToolRegistryBuilder};
pub use summarizer::ResultSummarizer;
pub use templates::TemplateFormatter;
pub use turn::{
    Answer, ApprovalRequest, ChatMessage, ChatRole, ToolOutput, ToolResult, TurnRequest,
    TurnResponse,
};
