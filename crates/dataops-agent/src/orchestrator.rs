//! Turn orchestrator.
//!
//! One call to [`TurnOrchestrator::handle_turn`] runs the full per-turn
//! state machine:
//!
//! ```text
//! START ──approved action──> EXECUTE_APPROVED ──> SUMMARIZE ──> DONE
//!   │
//!   └──> BUILD_CONTEXT ──model unconfigured──> RULE_MATCH ──> DONE
//!              │
//!              └──> LLM_CALL ──error──> RULE_MATCH
//!                      │  └──no tool calls──> DONE (plain text)
//!                      └──> SCAN_TOOLS ──approval needed──> DONE (pending)
//!                                └──> SUMMARIZE ──> DONE
//! ```
//!
//! The orchestrator keeps no state between turns.  History, auto mode and
//! any approved action come with each [`TurnRequest`], so one instance can
//! serve any number of concurrent callers behind an `Arc`.

use std::sync::Arc;

use uuid::Uuid;

use crate::approval::{PendingAction, needs_approval};
use crate::error::{AgentError, Result};
use crate::fallback::RuleMatcher;
use crate::llm::{CompletionOptions, LanguageModel, Message, ToolCall};
use crate::registry::ToolRegistry;
use crate::summarizer::ResultSummarizer;
use crate::templates::TemplateFormatter;
use crate::turn::{ToolResult, TurnRequest, TurnResponse, recent_history};

const TOOL_SELECTION_TEMPERATURE: f32 = 0.1;
const TOOL_SELECTION_MAX_TOKENS: u32 = 1024;

/// Default system prompt for the tool-selection call.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are DataOps Copilot, an operations assistant \
for a data platform. You can inspect datasets, ingestion batches, schemas, sandboxes and \
query jobs through the tools provided. Call a tool whenever the operator asks about platform \
state; never invent identifiers or results. Tools that create or delete resources are \
confirmed by the operator before they run. Answer briefly in markdown when no tool is needed.";

/// Per-turn state machine over the registry, the language model, the
/// summarizer and the rule fallback.
pub struct TurnOrchestrator {
    registry: Arc<ToolRegistry>,
    llm: Arc<dyn LanguageModel>,
    summarizer: ResultSummarizer,
    fallback: RuleMatcher,
    system_prompt: String,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("registry", &self.registry)
            .field("llm_configured", &self.llm.is_configured())
            .field("fallback_rules", &self.fallback.rules().len())
            .finish()
    }
}

impl TurnOrchestrator {
    /// Build an orchestrator with the default fallback rules and templates.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if a default fallback rule fails to
    /// compile.
    pub fn new(registry: Arc<ToolRegistry>, llm: Arc<dyn LanguageModel>) -> Result<Self> {
        Ok(Self {
            summarizer: ResultSummarizer::new(Arc::clone(&llm), TemplateFormatter::default()),
            registry,
            llm,
            fallback: RuleMatcher::with_default_rules()?,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
        })
    }

    /// Builder: replace the fallback rules.
    pub fn with_fallback(mut self, fallback: RuleMatcher) -> Self {
        self.fallback = fallback;
        self
    }

    /// Builder: replace the template formatter used by the summarizer and
    /// the fallback path.
    pub fn with_formatter(mut self, formatter: TemplateFormatter) -> Self {
        self.summarizer = ResultSummarizer::new(Arc::clone(&self.llm), formatter);
        self
    }

    /// Builder: replace the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn llm_configured(&self) -> bool {
        self.llm.is_configured()
    }

    /// Handle one inbound message.
    ///
    /// # Errors
    ///
    /// Only [`AgentError::Validation`], for an empty message without an
    /// approved action.  Model, tool and summarization failures degrade into
    /// the response instead.
    pub async fn handle_turn(&self, mut request: TurnRequest) -> Result<TurnResponse> {
        let turn_id = Uuid::now_v7();

        if let Some(action) = request.approved_action.take() {
            tracing::info!(%turn_id, tool = %action.tool_name, "executing approved action");
            return Ok(self.execute_approved(turn_id, action, &request.message).await);
        }

        if request.message.trim().is_empty() {
            return Err(AgentError::Validation {
                reason: "message is required".into(),
            });
        }

        tracing::info!(
            %turn_id,
            auto_mode = request.auto_mode,
            history_len = request.history.len(),
            "turn started"
        );

        if !self.llm.is_configured() {
            tracing::debug!(%turn_id, "language model not configured, using rules");
            return Ok(self.rule_match(&request).await);
        }

        let messages = self.build_context(&request);
        let definitions = self.registry.definitions();
        let tools = (!definitions.is_empty()).then_some(definitions.as_slice());
        let options =
            CompletionOptions::new(TOOL_SELECTION_TEMPERATURE, TOOL_SELECTION_MAX_TOKENS);

        let response = match self.llm.chat_completion(&messages, tools, options).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%turn_id, error = %e, "model call failed, using rules");
                return Ok(self.rule_match(&request).await);
            }
        };

        match response.tool_calls() {
            None => {
                tracing::info!(%turn_id, "model answered without tools");
                Ok(TurnResponse::answer(response.content(), Vec::new(), None))
            }
            Some(calls) => Ok(self.scan_tools(turn_id, calls, &request).await),
        }
    }

    /// System prompt, then the most recent history, then the new message.
    pub fn build_context(&self, request: &TurnRequest) -> Vec<Message> {
        let history = recent_history(&request.history);
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(history.iter().map(Message::from));
        messages.push(Message::user(&request.message));
        messages
    }

    // -- States --------------------------------------------------------------

    /// Run tool calls in model order.  The first call that needs approval
    /// ends the turn with a pending response; results gathered before it are
    /// dropped from that response.
    async fn scan_tools(
        &self,
        turn_id: Uuid,
        calls: &[ToolCall],
        request: &TurnRequest,
    ) -> TurnResponse {
        let mut results = Vec::with_capacity(calls.len());
        let mut tools_used = Vec::with_capacity(calls.len());

        for call in calls {
            if needs_approval(&self.registry, &call.name, request.auto_mode) {
                if !results.is_empty() {
                    tracing::warn!(
                        %turn_id,
                        tool = %call.name,
                        discarded = results.len(),
                        "approval required, discarding earlier tool results"
                    );
                }
                tracing::info!(%turn_id, tool = %call.name, "tool call awaiting approval");
                return TurnResponse::pending(PendingAction::for_call(
                    self.registry.get(&call.name),
                    &call.name,
                    &call.arguments,
                ));
            }

            let result = match self.registry.execute(&call.name, call.arguments.clone()).await {
                Ok(data) => ToolResult::data(&call.name, data),
                Err(e) => ToolResult::error(&call.name, e.reason()),
            };
            results.push(result);
            tools_used.push(call.name.clone());
        }

        tracing::info!(%turn_id, tools = ?tools_used, "tool scan complete");
        self.summarizer
            .summarize(&results, tools_used, &request.message)
            .await
    }

    /// Execute exactly the approved tool with its verbatim arguments.
    async fn execute_approved(
        &self,
        turn_id: Uuid,
        action: PendingAction,
        message: &str,
    ) -> TurnResponse {
        let tool = action.tool_name;
        match self.registry.execute(&tool, action.tool_arguments).await {
            Ok(data) => {
                let question = if message.trim().is_empty() {
                    action.action_description.as_str()
                } else {
                    message
                };
                let results = [ToolResult::data(&tool, data)];
                self.summarizer
                    .summarize(&results, vec![tool.clone()], question)
                    .await
            }
            Err(e) => {
                tracing::warn!(%turn_id, tool = %tool, error = %e, "approved action failed");
                TurnResponse::answer(
                    format!("❌ Failed to execute `{tool}`: {}", e.reason()),
                    vec![tool],
                    None,
                )
            }
        }
    }

    async fn rule_match(&self, request: &TurnRequest) -> TurnResponse {
        self.fallback
            .respond(
                &request.message,
                request.auto_mode,
                &self.registry,
                self.summarizer.formatter(),
            )
            .await
    }
}
