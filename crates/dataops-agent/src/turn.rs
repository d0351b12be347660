//! Turn request/response types.
//!
//! A turn is one request/response cycle of the orchestrator.  Everything a
//! turn needs (message, history, auto-mode flag, approved action) arrives
//! with the request; nothing is kept between turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::approval::PendingAction;
use crate::llm::Message;

/// Maximum number of history entries used to build model context.
pub const MAX_HISTORY_MESSAGES: usize = 20;

// ---------------------------------------------------------------------------
// Conversation history
// ---------------------------------------------------------------------------

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of the caller-supplied conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// A user message stamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// An assistant message stamped now.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

impl From<&ChatMessage> for Message {
    fn from(msg: &ChatMessage) -> Self {
        match msg.role {
            ChatRole::User => Message::user(&msg.content),
            ChatRole::Assistant => Message::assistant(&msg.content),
        }
    }
}

/// The most recent [`MAX_HISTORY_MESSAGES`] entries of `history`.
pub fn recent_history(history: &[ChatMessage]) -> &[ChatMessage] {
    let start = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    &history[start..]
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Input of one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default)]
    pub message: String,

    /// Authorizes bypassing the approval gate for every tool in this turn.
    #[serde(default)]
    pub auto_mode: bool,

    #[serde(default)]
    pub history: Vec<ChatMessage>,

    /// A previously returned pending action the operator has confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_action: Option<PendingAction>,
}

impl TurnRequest {
    /// A plain message with no history.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Builder: set the auto-mode flag.
    pub fn auto_mode(mut self, auto_mode: bool) -> Self {
        self.auto_mode = auto_mode;
        self
    }

    /// Builder: attach caller-held history.
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Builder: confirm a pending action.
    pub fn approve(mut self, action: PendingAction) -> Self {
        self.approved_action = Some(action);
        self
    }
}

// ---------------------------------------------------------------------------
// Tool results
// ---------------------------------------------------------------------------

/// Outcome of one executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutput {
    Data(Value),
    Error(String),
}

/// `{tool, data}` or `{tool, error}`; one per executed call, in call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    #[serde(flatten)]
    pub output: ToolOutput,
}

impl ToolResult {
    pub fn data(tool: impl Into<String>, data: Value) -> Self {
        Self {
            tool: tool.into(),
            output: ToolOutput::Data(data),
        }
    }

    pub fn error(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            output: ToolOutput::Error(error.into()),
        }
    }

    /// The data payload, if the tool succeeded.
    pub fn data_value(&self) -> Option<&Value> {
        match &self.output {
            ToolOutput::Data(v) => Some(v),
            ToolOutput::Error(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A normal, fallback or error-shaped answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub content: String,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A tool call halted at the approval gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// Always `true`; lets clients tell the two shapes apart.
    pub requires_approval: bool,
    #[serde(flatten)]
    pub action: PendingAction,
}

/// Output of one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnResponse {
    PendingApproval(ApprovalRequest),
    Answer(Answer),
}

impl TurnResponse {
    pub fn answer(content: impl Into<String>, tools_used: Vec<String>, data: Option<Value>) -> Self {
        Self::Answer(Answer {
            content: content.into(),
            tools_used,
            data,
        })
    }

    pub fn pending(action: PendingAction) -> Self {
        Self::PendingApproval(ApprovalRequest {
            requires_approval: true,
            action,
        })
    }

    /// Whether the turn stopped at the approval gate.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingApproval(_))
    }

    /// The answer text (empty for pending approvals).
    pub fn content(&self) -> &str {
        match self {
            Self::Answer(a) => &a.content,
            Self::PendingApproval(_) => "",
        }
    }

    /// Tools used to produce the answer (empty for pending approvals).
    pub fn tools_used(&self) -> &[String] {
        match self {
            Self::Answer(a) => &a.tools_used,
            Self::PendingApproval(_) => &[],
        }
    }
}
