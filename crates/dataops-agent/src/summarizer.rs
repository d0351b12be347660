//! Result summarizer.
//!
//! Turns raw tool output into the answer shown to the operator.  With a
//! configured language model the results are summarized in natural language;
//! otherwise, or whenever the model fails, the [`TemplateFormatter`] renders
//! them.  Data that was already fetched is never dropped on the way.

use std::sync::Arc;

use serde_json::Value;

use crate::llm::{CompletionOptions, LanguageModel, Message};
use crate::templates::TemplateFormatter;
use crate::turn::{ToolOutput, ToolResult, TurnResponse};

/// Maximum characters of serialized JSON per tool result in the prompt.
pub const MAX_RESULT_CHARS: usize = 3000;

/// Appended to a result that was cut at [`MAX_RESULT_CHARS`].
pub const TRUNCATION_MARKER: &str = "...";

const SUMMARY_TEMPERATURE: f32 = 0.3;
const SUMMARY_MAX_TOKENS: u32 = 1024;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a data platform operations assistant. \
Answer the operator's question using only the tool results provided. \
Be concise and format the answer in markdown. \
If a tool failed, say so in one short sentence.";

/// LLM-backed summarizer with a template fallback.
pub struct ResultSummarizer {
    llm: Arc<dyn LanguageModel>,
    formatter: TemplateFormatter,
}

impl ResultSummarizer {
    pub fn new(llm: Arc<dyn LanguageModel>, formatter: TemplateFormatter) -> Self {
        Self { llm, formatter }
    }

    /// The template formatter used for the fallback path.
    pub fn formatter(&self) -> &TemplateFormatter {
        &self.formatter
    }

    /// Summarize the results of one turn.
    pub async fn summarize(
        &self,
        results: &[ToolResult],
        tools_used: Vec<String>,
        original_message: &str,
    ) -> TurnResponse {
        if !self.llm.is_configured() {
            return self.template_summary(results, tools_used);
        }

        let messages = [
            Message::system(SUMMARY_SYSTEM_PROMPT),
            Message::user(build_summary_prompt(results, original_message)),
        ];
        let options = CompletionOptions::new(SUMMARY_TEMPERATURE, SUMMARY_MAX_TOKENS);

        match self.llm.chat_completion(&messages, None, options).await {
            Ok(response) if !response.content().trim().is_empty() => TurnResponse::answer(
                response.content(),
                tools_used,
                last_data(results),
            ),
            Ok(_) => {
                tracing::warn!("summary model returned no text, using templates");
                self.template_summary(results, tools_used)
            }
            Err(e) => {
                tracing::warn!(error = %e, "summary model failed, using templates");
                self.template_summary(results, tools_used)
            }
        }
    }

    /// Render the results with the template formatter only.
    pub fn template_summary(&self, results: &[ToolResult], tools_used: Vec<String>) -> TurnResponse {
        TurnResponse::answer(
            self.formatter.format_results(results),
            tools_used,
            last_data(results),
        )
    }
}

/// The data of the last result, if it succeeded.
fn last_data(results: &[ToolResult]) -> Option<Value> {
    results.last().and_then(|r| r.data_value()).cloned()
}

/// Serialize `value` and cut it to [`MAX_RESULT_CHARS`] characters, adding
/// [`TRUNCATION_MARKER`] when anything was removed.
pub fn truncate_json(value: &Value) -> String {
    let json = value.to_string();
    match json.char_indices().nth(MAX_RESULT_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &json[..cut]),
        None => json,
    }
}

/// One prompt section per tool result, in call order.
pub fn build_summary_prompt(results: &[ToolResult], original_message: &str) -> String {
    let mut prompt = format!("Operator question: {original_message}\n\nTool results:\n");
    for result in results {
        match &result.output {
            ToolOutput::Data(data) => {
                prompt.push_str(&format!(
                    "\n### {}\n```json\n{}\n```\n",
                    result.tool,
                    truncate_json(data)
                ));
            }
            ToolOutput::Error(error) => {
                prompt.push_str(&format!("\n### {} (failed)\nError: {error}\n", result.tool));
            }
        }
    }
    prompt.push_str("\nAnswer the question concisely in markdown.");
    prompt
}
