//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`].  Each variant
//! carries enough context for callers to decide how to handle the failure.

/// Unified error type for the agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The LLM response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Tool errors ---------------------------------------------------------
    /// A tool call referenced a name that is not in the registry.
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    /// The executor bound to a tool failed.
    #[error("tool execution failed for `{tool_name}`: {reason}")]
    ToolExecution { tool_name: String, reason: String },

    // -- Job polling ---------------------------------------------------------
    /// Submitting or polling a remote job failed.
    #[error("job `{job_id}` failed to poll: {reason}")]
    JobPollFailed { job_id: String, reason: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    Config { reason: String },

    /// Validation failed for input data.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal agent error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}

impl AgentError {
    /// Short reason text without the variant prefix, used when an error is
    /// shown to the operator inside a chat answer.
    pub fn reason(&self) -> String {
        match self {
            Self::ToolExecution { reason, .. }
            | Self::LlmRequestFailed { reason }
            | Self::LlmParseFailed { reason }
            | Self::JobPollFailed { reason, .. }
            | Self::Config { reason }
            | Self::Validation { reason } => reason.clone(),
            other => other.to_string(),
        }
    }
}
