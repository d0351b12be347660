//! Adapter error types.
//!
//! Platform calls and tool executors surface errors through
//! [`AdapterError`].  At the tool-executor seam they convert into
//! [`AgentError::ToolExecution`] so the orchestrator can record them per
//! tool.

use dataops_agent::AgentError;

/// Unified error type for the platform adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The requested tool is not served by this executor.
    #[error("tool not found: `{tool_name}`")]
    ToolNotFound { tool_name: String },

    /// The arguments supplied to a tool are invalid.
    #[error("invalid parameters for tool `{tool_name}`: {reason}")]
    InvalidParams { tool_name: String, reason: String },

    /// A resource id that cannot be addressed as one path segment.
    #[error("invalid resource id `{id}`")]
    InvalidId { id: String },

    /// The platform answered with a non-success status.
    #[error("platform returned {status} for {method} {path}: {body}")]
    Http {
        status: u16,
        method: String,
        path: String,
        body: String,
    },

    /// The request never produced a response.
    #[error("platform request to {path} failed: {reason}")]
    Request { path: String, reason: String },

    /// An operation exceeded its time limit.
    #[error("timeout after {seconds}s: {reason}")]
    Timeout { seconds: u64, reason: String },

    /// The platform response did not have the expected shape.
    #[error("unexpected platform response: {0}")]
    UnexpectedResponse(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error in adapter setup.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;

impl AdapterError {
    /// Attach the name of the tool that failed.
    pub fn into_tool_error(self, tool_name: &str) -> AgentError {
        AgentError::ToolExecution {
            tool_name: tool_name.to_owned(),
            reason: self.to_string(),
        }
    }

    /// HTTP status of a platform rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<AdapterError> for AgentError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::ToolNotFound { tool_name } => AgentError::UnknownTool { tool_name },
            AdapterError::InvalidParams { .. } | AdapterError::InvalidId { .. } => {
                AgentError::Validation {
                    reason: err.to_string(),
                }
            }
            AdapterError::ConfigError(reason) => AgentError::Config { reason },
            other => AgentError::ToolExecution {
                tool_name: "platform".into(),
                reason: other.to_string(),
            },
        }
    }
}
