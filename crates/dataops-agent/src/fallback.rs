//! Rule-based fallback.
//!
//! When no language model is configured, or the model call fails, the
//! orchestrator matches the raw message against an ordered list of regex
//! rules.  The first rule that matches runs its tool with fixed arguments and
//! the result is rendered through the [`TemplateFormatter`].
//!
//! | Order | Matches | Tool | Arguments |
//! |-------|---------|------|-----------|
//! | 1 | "failed batches" | `get_failed_batches` | `{"limit": 20}` |
//! | 2 | "batches" | `list_batches` | `{"limit": 10}` |
//! | 3 | "datasets" | `list_datasets` | `{"limit": 10}` |
//! | 4 | "schemas" | `list_schemas` | `{"limit": 10}` |
//! | 5 | "queries" | `list_queries` | `{"limit": 10}` |
//! | 6 | "sandboxes" | `list_sandboxes` | `{}` |

use regex::Regex;
use serde_json::{Value, json};

use crate::approval::{PendingAction, needs_approval};
use crate::error::{AgentError, Result};
use crate::registry::ToolRegistry;
use crate::templates::TemplateFormatter;
use crate::turn::TurnResponse;

/// Returned when no rule matches.
pub const HELP_TEXT: &str = "I can help you inspect your data platform. Try asking:\n\
- \"Show me failed batches\"\n\
- \"List recent batches\"\n\
- \"What datasets do we have?\"\n\
- \"List schemas\"\n\
- \"Show recent queries\"\n\
- \"List sandboxes\"\n";

/// One `(pattern, tool, static arguments)` rule.
#[derive(Debug, Clone)]
pub struct FallbackRule {
    pattern: Regex,
    tool: String,
    arguments: Value,
}

impl FallbackRule {
    /// Compile a rule.  Patterns are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the pattern does not compile.
    pub fn new(pattern: &str, tool: impl Into<String>, arguments: Value) -> Result<Self> {
        let compiled = Regex::new(&format!("(?i){pattern}")).map_err(|e| AgentError::Config {
            reason: format!("invalid fallback pattern `{pattern}`: {e}"),
        })?;
        Ok(Self {
            pattern: compiled,
            tool: tool.into(),
            arguments,
        })
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    pub fn is_match(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }
}

/// Ordered rule list; first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    rules: Vec<FallbackRule>,
}

impl RuleMatcher {
    /// A matcher with no rules; every message gets the help text.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in rules for the platform tools.
    pub fn with_default_rules() -> Result<Self> {
        let rules = vec![
            FallbackRule::new(
                r"\bfail(?:ed|ing|ures?)?\b.*\bbatch|\bbatch(?:es)?\b.*\bfail",
                "get_failed_batches",
                json!({"limit": 20}),
            )?,
            FallbackRule::new(r"\bbatch(?:es)?\b", "list_batches", json!({"limit": 10}))?,
            FallbackRule::new(r"\bdatasets?\b", "list_datasets", json!({"limit": 10}))?,
            FallbackRule::new(r"\bschemas?\b", "list_schemas", json!({"limit": 10}))?,
            FallbackRule::new(r"\bquer(?:y|ies)\b", "list_queries", json!({"limit": 10}))?,
            FallbackRule::new(r"\bsandbox(?:es)?\b", "list_sandboxes", json!({}))?,
        ];
        Ok(Self { rules })
    }

    /// Builder: append a rule after the existing ones.
    pub fn with_rule(mut self, rule: FallbackRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    /// The first rule matching `message`.
    pub fn find(&self, message: &str) -> Option<&FallbackRule> {
        self.rules.iter().find(|r| r.is_match(message))
    }

    /// Answer `message` without a language model.
    ///
    /// Tool failures become an error line in the content; nothing is
    /// propagated.
    pub async fn respond(
        &self,
        message: &str,
        auto_mode: bool,
        registry: &ToolRegistry,
        formatter: &TemplateFormatter,
    ) -> TurnResponse {
        let Some(rule) = self.find(message) else {
            tracing::debug!("no fallback rule matched");
            return TurnResponse::answer(HELP_TEXT, Vec::new(), None);
        };

        tracing::info!(tool = %rule.tool, "fallback rule matched");

        if needs_approval(registry, &rule.tool, auto_mode) {
            return TurnResponse::pending(PendingAction::for_call(
                registry.get(&rule.tool),
                &rule.tool,
                &rule.arguments,
            ));
        }

        match registry.execute(&rule.tool, rule.arguments.clone()).await {
            Ok(data) => TurnResponse::answer(
                formatter.format(&rule.tool, &data),
                vec![rule.tool.clone()],
                Some(data),
            ),
            Err(e) => TurnResponse::answer(
                format!("❌ Error: {}", e.reason()),
                vec![rule.tool.clone()],
                None,
            ),
        }
    }
}
