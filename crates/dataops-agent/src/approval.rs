//! Approval gate.
//!
//! Decides whether a tool call must pause for explicit operator confirmation
//! before it runs.  The policy lives here, apart from the orchestration
//! control flow, so it can be audited on its own.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::ToolDefinition;
use crate::registry::ToolRegistry;

/// `true` when `tool_name` requires approval and auto mode is off.
pub fn needs_approval(registry: &ToolRegistry, tool_name: &str, auto_mode: bool) -> bool {
    registry.requires_approval(tool_name) && !auto_mode
}

/// A tool call blocked on approval.
///
/// Not stored server side: the caller echoes it back verbatim as the
/// approved action of a later turn, and the orchestrator executes exactly
/// this tool with exactly these arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    /// Registry name of the tool to run.
    pub tool_name: String,

    /// Arguments to pass, verbatim.
    #[serde(default)]
    pub tool_arguments: Value,

    /// Human-readable summary shown in the confirmation prompt.
    #[serde(default)]
    pub action_description: String,
}

impl PendingAction {
    /// Build a pending action, describing it from the tool definition when
    /// one is known.
    pub fn for_call(definition: Option<&ToolDefinition>, tool_name: &str, arguments: &Value) -> Self {
        Self {
            tool_name: tool_name.to_owned(),
            tool_arguments: arguments.clone(),
            action_description: describe_action(definition, tool_name, arguments),
        }
    }
}

fn describe_action(definition: Option<&ToolDefinition>, tool_name: &str, arguments: &Value) -> String {
    let args = match arguments {
        Value::Null => "no arguments".to_owned(),
        Value::Object(map) if map.is_empty() => "no arguments".to_owned(),
        other => other.to_string(),
    };
    match definition {
        Some(def) => format!("{} (`{tool_name}` with {args})", def.description),
        None => format!("Run `{tool_name}` with {args}"),
    }
}
