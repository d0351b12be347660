//! Core types for LLM interaction.
//!
//! These types model the data flowing between the turn orchestrator and LLM
//! providers.  They are provider-agnostic at this layer; the [`super::client`]
//! module translates them into provider-specific wire formats.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a model conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the human operator.
    User,
    /// Output from the LLM.
    Assistant,
}

/// A single message sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// A tool invocation requested by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the LLM (may be empty for some providers).
    #[serde(default)]
    pub id: String,

    /// The name of the tool to invoke.
    pub name: String,

    /// Arguments as a JSON value.  Not validated against the tool schema.
    #[serde(default)]
    pub arguments: Value,
}

/// A tool definition: what the model sees, plus the approval policy flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description of what the tool does.
    pub description: String,

    /// JSON Schema describing the tool's input parameters.
    pub input_schema: Value,

    /// Whether the tool mutates remote state and must be confirmed by the
    /// operator before it runs.  Never sent to the model.
    #[serde(default)]
    pub requires_approval: bool,
}

impl ToolDefinition {
    /// Create a read-only tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            requires_approval: false,
        }
    }

    /// Builder: mark the tool as requiring operator approval.
    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}

// ---------------------------------------------------------------------------
// LLM response
// ---------------------------------------------------------------------------

/// The high-level response from an LLM after one completion call.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    /// The model produced a final text answer.
    Text(String),

    /// The model wants to invoke one or more tools.
    ToolCalls(Vec<ToolCall>),
}

impl LlmResponse {
    /// The tool calls requested by the model, or `None` for a text answer.
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match self {
            Self::ToolCalls(calls) if !calls.is_empty() => Some(calls),
            _ => None,
        }
    }

    /// The text content of the response (empty for tool-call responses).
    pub fn content(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::ToolCalls(_) => "",
        }
    }
}

// ---------------------------------------------------------------------------
// Chat request
// ---------------------------------------------------------------------------

/// Sampling options for a single completion call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompletionOptions {
    /// Sampling temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: Option<f32>,

    /// Maximum tokens the model may generate.
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    /// Options with both fields set.
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }
}

/// A full request to send to an LLM provider.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The model identifier.  Empty means "use the client default".
    pub model: String,

    /// The conversation history.
    pub messages: Vec<Message>,

    /// Tool definitions the model may invoke.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens the model may generate in this call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}
