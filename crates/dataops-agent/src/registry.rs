//! Tool registry.
//!
//! The registry is the static capability table of the copilot: tool name →
//! definition (schema, description, approval flag) → executor binding.  It is
//! built once at start-up and is immutable afterwards, so it can be shared
//! behind an `Arc` and read from any number of concurrent turns without
//! locking.
//!
//! Every tool execution in the crate goes through [`ToolRegistry::execute`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::ToolDefinition;

// ---------------------------------------------------------------------------
// Executor trait
// ---------------------------------------------------------------------------

/// Trait for components that perform the remote operation behind a tool.
///
/// One executor may serve several tool names; the registry passes the name
/// it was invoked under so the executor can dispatch.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a named tool with the given arguments, returning plain data.
    async fn execute(&self, tool_name: &str, arguments: Value) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct RegisteredTool {
    definition: ToolDefinition,
    executor: Arc<dyn ToolExecutor>,
}

/// Immutable table of tools available to the orchestrator.
pub struct ToolRegistry {
    /// Registration order is preserved for listing and for the model.
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field(
                "tools",
                &self.tools.iter().map(|t| &t.definition.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ToolRegistry {
    /// Start building a registry.
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Tool definitions exposed to the language model for tool-call
    /// generation.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Tool definitions for display purposes (same order as registration).
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.definitions()
    }

    /// Look up a single definition.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i].definition)
    }

    /// Whether the tool must be confirmed by the operator before it runs.
    /// Unknown tools never require approval; executing them fails instead.
    pub fn requires_approval(&self, name: &str) -> bool {
        self.get(name).is_some_and(|d| d.requires_approval)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool through its bound executor.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownTool`] for unregistered names and
    /// [`AgentError::ToolExecution`] (carrying the tool name and the
    /// underlying cause) when the executor fails.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<Value> {
        let tool = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| AgentError::UnknownTool {
                tool_name: name.to_owned(),
            })?;

        let start = Instant::now();
        tracing::debug!(tool = %name, "executing tool");

        match tool.executor.execute(name, arguments).await {
            Ok(data) => {
                tracing::info!(
                    tool = %name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "tool completed"
                );
                Ok(data)
            }
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool execution failed");
                Err(match e {
                    err @ AgentError::ToolExecution { .. } => err,
                    other => AgentError::ToolExecution {
                        tool_name: name.to_owned(),
                        reason: other.to_string(),
                    },
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects tool registrations and produces an immutable [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistryBuilder {
    /// Bind a tool definition to an executor.
    pub fn register(mut self, definition: ToolDefinition, executor: Arc<dyn ToolExecutor>) -> Self {
        self.tools.push(RegisteredTool {
            definition,
            executor,
        });
        self
    }

    /// Bind several definitions to the same executor.
    pub fn register_all(
        mut self,
        definitions: impl IntoIterator<Item = ToolDefinition>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        for definition in definitions {
            self = self.register(definition, Arc::clone(&executor));
        }
        self
    }

    /// Finish building.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if two tools share a name.
    pub fn build(self) -> Result<ToolRegistry> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (i, tool) in self.tools.iter().enumerate() {
            if index.insert(tool.definition.name.clone(), i).is_some() {
                return Err(AgentError::Config {
                    reason: format!("tool `{}` registered twice", tool.definition.name),
                });
            }
        }

        tracing::debug!(tool_count = self.tools.len(), "tool registry built");
        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
