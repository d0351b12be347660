//! Multi-provider LLM client.
//!
//! Supports the **Anthropic Messages API** and the **OpenAI Chat Completions
//! API** (including OpenAI-compatible endpoints such as Ollama, Together, and
//! vLLM) in non-streaming mode.  A client built without an API key is valid
//! but reports itself as unconfigured, which routes every turn to the rule
//! fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::llm::LanguageModel;
use crate::llm::types::{
    ChatRequest, CompletionOptions, LlmResponse, Message, Role, ToolCall, ToolDefinition,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default Anthropic API base URL.
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Per-request HTTP timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which LLM provider the client should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API (also covers OpenAI-compatible endpoints).
    OpenAI,
}

impl LlmProvider {
    pub fn name(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "openai-compatible" | "ollama" => Ok(Self::OpenAI),
            other => Err(AgentError::Config {
                reason: format!("unknown llm provider `{other}`"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single LLM provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Which provider this configuration targets.
    pub provider: LlmProvider,
    /// API key for authentication.  Empty means "not configured".
    pub api_key: String,
    /// Base URL for the API (e.g. `https://api.anthropic.com`).
    pub base_url: String,
    /// Default model identifier.
    pub default_model: String,
    /// Default maximum tokens per response.
    pub max_tokens: u32,
}

impl LlmClientConfig {
    /// Create a configuration for the Anthropic Claude API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_owned(),
            default_model: model.into(),
            max_tokens: 4096,
        }
    }

    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            default_model: model.into(),
            max_tokens: 4096,
        }
    }

    /// Create a configuration for any OpenAI-compatible API (e.g. Ollama,
    /// Together, vLLM).
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: model.into(),
            max_tokens: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An LLM client that communicates with either the Anthropic Messages API or
/// the OpenAI Chat Completions API.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: Arc<LlmClientConfig>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Returns the configured provider.
    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    /// Returns the default model identifier.
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// Send a chat request and return the full response.
    pub async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        if self.config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: self.config.provider.name().into(),
            });
        }

        let (url, headers, body) = match self.config.provider {
            LlmProvider::Anthropic => (
                format!("{}/v1/messages", self.config.base_url),
                self.anthropic_headers()?,
                self.build_anthropic_request_body(request),
            ),
            LlmProvider::OpenAI => (
                format!("{}/chat/completions", self.config.base_url),
                self.openai_headers()?,
                self.build_openai_request_body(request),
            ),
        };

        tracing::debug!(
            url = %url,
            model = %body["model"],
            provider = self.config.provider.name(),
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            "sending LLM request"
        );

        let resp = self.http.post(&url).headers(headers).json(&body).send().await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(AgentError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        match self.config.provider {
            LlmProvider::Anthropic => parse_anthropic_response(&v),
            LlmProvider::OpenAI => parse_openai_response(&v),
        }
    }

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.is_empty() {
            &self.config.default_model
        } else {
            &request.model
        }
    }

    // -- Anthropic -----------------------------------------------------------

    /// Build the JSON body for the Anthropic Messages API.
    fn build_anthropic_request_body(&self, request: &ChatRequest) -> Value {
        let (system_text, messages) = messages_to_anthropic(&request.messages);

        let mut body = json!({
            "model": self.model_for(request),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": messages,
        });

        if let Some(system) = system_text {
            body["system"] = json!(system);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        if !request.tools.is_empty() {
            body["tools"] = tools_to_anthropic(&request.tools);
        }

        body
    }

    fn anthropic_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| {
                AgentError::LlmRequestFailed {
                    reason: format!("invalid API key header: {e}"),
                }
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    // -- OpenAI --------------------------------------------------------------

    /// Build the JSON body for the OpenAI Chat Completions API.
    fn build_openai_request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model_for(request),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": messages_to_openai(&request.messages),
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        if !request.tools.is_empty() {
            body["tools"] = tools_to_openai(&request.tools);
        }

        body
    }

    fn openai_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn chat_completion(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: CompletionOptions,
    ) -> Result<LlmResponse> {
        let request = ChatRequest {
            model: String::new(),
            messages: messages.to_vec(),
            tools: tools.map(<[ToolDefinition]>::to_vec).unwrap_or_default(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        self.chat(&request).await
    }
}

// ===========================================================================
// Anthropic format conversion (free functions)
// ===========================================================================

/// Split the system messages out (Anthropic expects them as a top-level
/// field) and convert the remaining messages to the Anthropic wire format.
fn messages_to_anthropic(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system: Option<String> = None;
    let mut wire_messages: Vec<Value> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => match &mut system {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&msg.content);
                }
                None => system = Some(msg.content.clone()),
            },
            Role::User => wire_messages.push(json!({
                "role": "user",
                "content": msg.content,
            })),
            Role::Assistant => wire_messages.push(json!({
                "role": "assistant",
                "content": msg.content,
            })),
        }
    }

    (system, wire_messages)
}

/// Convert tool definitions into the Anthropic API format.
fn tools_to_anthropic(tools: &[ToolDefinition]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a non-streaming Anthropic Messages API response.
fn parse_anthropic_response(v: &Value) -> Result<LlmResponse> {
    let content = v["content"]
        .as_array()
        .ok_or_else(|| AgentError::LlmParseFailed {
            reason: "missing `content` array in response".into(),
        })?;

    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t);
                }
            }
            Some("tool_use") => tool_calls.push(ToolCall {
                id: block["id"].as_str().unwrap_or_default().to_owned(),
                name: block["name"].as_str().unwrap_or_default().to_owned(),
                arguments: block["input"].clone(),
            }),
            _ => {}
        }
    }

    if tool_calls.is_empty() {
        Ok(LlmResponse::Text(text_parts.concat()))
    } else {
        Ok(LlmResponse::ToolCalls(tool_calls))
    }
}

// ===========================================================================
// OpenAI format conversion (free functions)
// ===========================================================================

/// Convert internal messages to the OpenAI Chat Completions wire format.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({ "role": role, "content": msg.content })
        })
        .collect()
}

/// Convert tool definitions into the OpenAI Chat Completions API format.
///
/// OpenAI wraps each tool in `{"type": "function", "function": {...}}`.
pub fn tools_to_openai(tools: &[ToolDefinition]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                }
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a non-streaming OpenAI Chat Completions API response into an
/// [`LlmResponse`].
pub fn parse_openai_response(v: &Value) -> Result<LlmResponse> {
    let message = &v["choices"][0]["message"];

    if message.is_null() {
        return Err(AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    if let Some(tool_calls_arr) = message["tool_calls"].as_array()
        && !tool_calls_arr.is_empty()
    {
        let calls: Result<Vec<ToolCall>> = tool_calls_arr
            .iter()
            .map(|tc| {
                let func = &tc["function"];
                let name = func["name"].as_str().unwrap_or_default().to_owned();
                let args_str = func["arguments"].as_str().unwrap_or("{}");
                let arguments: Value =
                    serde_json::from_str(args_str).map_err(|e| AgentError::LlmParseFailed {
                        reason: format!("invalid JSON in OpenAI tool call `{name}` arguments: {e}"),
                    })?;

                Ok(ToolCall {
                    id: tc["id"].as_str().unwrap_or_default().to_owned(),
                    name,
                    arguments,
                })
            })
            .collect();

        return Ok(LlmResponse::ToolCalls(calls?));
    }

    let content = message["content"].as_str().unwrap_or_default();
    Ok(LlmResponse::Text(content.to_owned()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_tool() -> ToolDefinition {
        ToolDefinition::new(
            "list_datasets",
            "List datasets",
            json!({"type": "object", "properties": {"limit": {"type": "integer"}}}),
        )
    }

    #[test]
    fn build_anthropic_request_body_basic() {
        let config = LlmClientConfig::anthropic("test-key", "claude-sonnet-4-20250514");
        let client = LlmClient::new(config).unwrap();

        let request = ChatRequest {
            model: String::new(),
            messages: vec![Message::system("You are helpful."), Message::user("Hello")],
            tools: vec![],
            temperature: Some(0.7),
            max_tokens: Some(1024),
        };

        let body = client.build_anthropic_request_body(&request);

        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["system"], "You are helpful.");
        assert_eq!(body["max_tokens"], 1024);
        let temp = body["temperature"].as_f64().unwrap();
        assert!((temp - 0.7).abs() < 1e-6, "temperature was {temp}");
        assert!(body.get("tools").is_none());

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hello");
    }

    #[test]
    fn anthropic_tools_omit_approval_flag() {
        let config = LlmClientConfig::anthropic("test-key", "claude-sonnet-4-20250514");
        let client = LlmClient::new(config).unwrap();

        let request = ChatRequest {
            model: "claude-haiku".into(),
            messages: vec![Message::user("list datasets")],
            tools: vec![dataset_tool().with_approval()],
            temperature: None,
            max_tokens: None,
        };

        let body = client.build_anthropic_request_body(&request);
        assert_eq!(body["model"], "claude-haiku");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["tools"][0]["name"], "list_datasets");
        assert!(body["tools"][0].get("requires_approval").is_none());
    }

    #[test]
    fn build_openai_request_body_keeps_system_in_messages() {
        let config = LlmClientConfig::openai("sk-test", "gpt-4o-mini");
        let client = LlmClient::new(config).unwrap();

        let request = ChatRequest {
            model: String::new(),
            messages: vec![Message::system("sys"), Message::user("hi")],
            tools: vec![dataset_tool()],
            temperature: Some(0.1),
            max_tokens: None,
        };

        let body = client.build_openai_request_body(&request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "list_datasets");
    }

    #[test]
    fn empty_api_key_is_unconfigured() {
        let client = LlmClient::new(LlmClientConfig::anthropic("", "claude")).unwrap();
        assert!(!client.is_configured());

        let configured = LlmClient::new(LlmClientConfig::openai("k", "gpt")).unwrap();
        assert!(configured.is_configured());
    }

    #[tokio::test]
    async fn chat_without_api_key_fails_fast() {
        let client = LlmClient::new(LlmClientConfig::openai("", "gpt")).unwrap();
        let err = client
            .chat_completion(&[Message::user("hi")], None, CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingApiKey { ref provider } if provider == "openai"));
    }

    #[test]
    fn parse_anthropic_text_response() {
        let v = json!({
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "text", "text": "world!"}
            ],
            "stop_reason": "end_turn"
        });

        let result = parse_anthropic_response(&v).unwrap();
        assert_eq!(result, LlmResponse::Text("Hello, world!".into()));
    }

    #[test]
    fn parse_anthropic_tool_use_response() {
        let v = json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {
                    "type": "tool_use",
                    "id": "toolu_01",
                    "name": "get_failed_batches",
                    "input": {"limit": 5}
                }
            ]
        });

        let result = parse_anthropic_response(&v).unwrap();
        let calls = result.tool_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_01");
        assert_eq!(calls[0].name, "get_failed_batches");
        assert_eq!(calls[0].arguments["limit"], 5);
    }

    #[test]
    fn parse_anthropic_missing_content_is_error() {
        let err = parse_anthropic_response(&json!({"id": "x"})).unwrap_err();
        assert!(matches!(err, AgentError::LlmParseFailed { .. }));
    }

    #[test]
    fn parse_openai_tool_calls_in_order() {
        let v = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "c1", "type": "function",
                         "function": {"name": "list_datasets", "arguments": "{\"limit\":3}"}},
                        {"id": "c2", "type": "function",
                         "function": {"name": "delete_dataset", "arguments": "{\"datasetId\":\"ds1\"}"}}
                    ]
                }
            }]
        });

        let result = parse_openai_response(&v).unwrap();
        let calls = result.tool_calls().unwrap();
        assert_eq!(calls[0].name, "list_datasets");
        assert_eq!(calls[0].arguments["limit"], 3);
        assert_eq!(calls[1].name, "delete_dataset");
        assert_eq!(calls[1].arguments["datasetId"], "ds1");
    }

    #[test]
    fn parse_openai_invalid_arguments_is_error() {
        let v = json!({
            "choices": [{
                "message": {
                    "tool_calls": [
                        {"id": "c1", "function": {"name": "x", "arguments": "{not json"}}
                    ]
                }
            }]
        });
        assert!(parse_openai_response(&v).is_err());
    }

    #[test]
    fn parse_openai_text_response() {
        let v = json!({"choices": [{"message": {"content": "All good."}}]});
        assert_eq!(
            parse_openai_response(&v).unwrap(),
            LlmResponse::Text("All good.".into())
        );
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("Anthropic".parse::<LlmProvider>().unwrap(), LlmProvider::Anthropic);
        assert_eq!("ollama".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert!("gemini".parse::<LlmProvider>().is_err());
    }
}
