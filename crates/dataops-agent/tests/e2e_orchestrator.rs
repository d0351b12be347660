//! End-to-end tests for the turn orchestrator.
//!
//! A scripted language model replays canned responses and a recording
//! executor logs every tool that actually ran, so each test can check both
//! the response and the side effects of a turn.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dataops_agent::{
    AgentError, ChatMessage, CompletionOptions, LanguageModel, LlmResponse, Message, Result,
    ToolCall, ToolDefinition, ToolExecutor, ToolRegistry, TurnOrchestrator, TurnRequest,
    TurnResponse,
};
use serde_json::{Value, json};

// ── test doubles ──────────────────────────────────────────────────────────────

/// Replays queued responses; an exhausted script fails the call.
#[derive(Default)]
struct ScriptedModel {
    configured: bool,
    script: Mutex<VecDeque<Result<LlmResponse>>>,
    calls: Mutex<Vec<(Vec<Message>, bool, CompletionOptions)>>,
}

impl ScriptedModel {
    fn configured(script: Vec<Result<LlmResponse>>) -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn unconfigured() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn chat_completion(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: CompletionOptions,
    ) -> Result<LlmResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), tools.is_some(), options));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(AgentError::LlmRequestFailed {
                    reason: "script exhausted".into(),
                })
            })
    }
}

/// Records every execution and answers from a fixed table.
#[derive(Default)]
struct RecordingExecutor {
    executed: Mutex<Vec<(String, Value)>>,
}

impl RecordingExecutor {
    fn executed_names(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn execute(&self, tool_name: &str, arguments: Value) -> Result<Value> {
        self.executed
            .lock()
            .unwrap()
            .push((tool_name.to_owned(), arguments.clone()));
        match tool_name {
            "get_failed_batches" => Ok(json!({"batches": []})),
            "list_datasets" => Ok(json!({"datasets": [{"id": "ds-1", "name": "orders"}]})),
            "get_batch" => Err(AgentError::Internal("batch not found".into())),
            "delete_dataset" => Ok(json!({"deleted": arguments["datasetId"]})),
            other => Ok(json!({"tool": other})),
        }
    }
}

fn setup(model: Arc<ScriptedModel>) -> (TurnOrchestrator, Arc<RecordingExecutor>) {
    let executor = Arc::new(RecordingExecutor::default());
    let registry = ToolRegistry::builder()
        .register_all(
            [
                ToolDefinition::new("get_failed_batches", "List failed batches", json!({})),
                ToolDefinition::new("list_datasets", "List datasets", json!({})),
                ToolDefinition::new("get_batch", "Get a batch", json!({})),
                ToolDefinition::new("delete_dataset", "Delete a dataset", json!({}))
                    .with_approval(),
                ToolDefinition::new("create_dataset", "Create a dataset", json!({}))
                    .with_approval(),
            ],
            Arc::clone(&executor) as Arc<dyn ToolExecutor>,
        )
        .build()
        .unwrap();
    let orchestrator = TurnOrchestrator::new(Arc::new(registry), model).unwrap();
    (orchestrator, executor)
}

fn call(name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: format!("call_{name}"),
        name: name.into(),
        arguments,
    }
}

fn tool_calls(calls: Vec<ToolCall>) -> Result<LlmResponse> {
    Ok(LlmResponse::ToolCalls(calls))
}

fn answer(resp: TurnResponse) -> dataops_agent::Answer {
    match resp {
        TurnResponse::Answer(a) => a,
        other => panic!("expected an answer, got {other:?}"),
    }
}

// ── rule fallback ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_batches_without_model() {
    let model = ScriptedModel::unconfigured();
    let (orch, exec) = setup(Arc::clone(&model));

    let resp = orch
        .handle_turn(TurnRequest::new("show me failed batches"))
        .await
        .unwrap();

    assert_eq!(
        resp.content(),
        "✅ **Great news!** No failed batches found. Your ingestion is running smoothly!\n"
    );
    assert_eq!(exec.executed_names(), ["get_failed_batches"]);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn model_failure_degrades_to_rules() {
    let model = ScriptedModel::configured(vec![Err(AgentError::LlmRequestFailed {
        reason: "connection refused".into(),
    })]);
    let (orch, exec) = setup(model);

    let resp = orch
        .handle_turn(TurnRequest::new("any failed batches today?"))
        .await
        .unwrap();
    assert!(resp.content().contains("Great news!"));
    assert_eq!(exec.executed_names(), ["get_failed_batches"]);
}

#[tokio::test]
async fn unmatched_message_without_model_gets_help() {
    let (orch, exec) = setup(ScriptedModel::unconfigured());
    let resp = orch.handle_turn(TurnRequest::new("tell me a joke")).await.unwrap();
    assert_eq!(resp.content(), dataops_agent::fallback::HELP_TEXT);
    assert!(exec.executed_names().is_empty());
}

// ── LLM path ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn plain_text_answer_runs_no_tools() {
    let model = ScriptedModel::configured(vec![Ok(LlmResponse::Text("Hi there.".into()))]);
    let (orch, exec) = setup(Arc::clone(&model));

    let a = answer(orch.handle_turn(TurnRequest::new("hello")).await.unwrap());
    assert_eq!(a.content, "Hi there.");
    assert!(a.tools_used.is_empty());
    assert!(a.data.is_none());
    assert!(exec.executed_names().is_empty());

    let calls = model.calls.lock().unwrap();
    let (_, offered_tools, options) = &calls[0];
    assert!(*offered_tools);
    assert_eq!(options.temperature, Some(0.1));
    assert_eq!(options.max_tokens, Some(1024));
}

#[tokio::test]
async fn tools_used_follow_call_order_and_data_is_last_result() {
    let model = ScriptedModel::configured(vec![
        tool_calls(vec![
            call("get_failed_batches", json!({"limit": 5})),
            call("list_datasets", json!({})),
        ]),
        Ok(LlmResponse::Text("Nothing failed; one dataset exists.".into())),
    ]);
    let (orch, exec) = setup(Arc::clone(&model));

    let a = answer(orch.handle_turn(TurnRequest::new("status?")).await.unwrap());
    assert_eq!(a.tools_used, ["get_failed_batches", "list_datasets"]);
    assert_eq!(a.content, "Nothing failed; one dataset exists.");
    assert_eq!(a.data, Some(json!({"datasets": [{"id": "ds-1", "name": "orders"}]})));
    assert_eq!(exec.executed_names(), ["get_failed_batches", "list_datasets"]);

    // Second model call is the summary: no tools offered, temperature 0.3.
    let calls = model.calls.lock().unwrap();
    let (summary_prompt, offered_tools, options) = &calls[1];
    assert!(!*offered_tools);
    assert_eq!(options.temperature, Some(0.3));
    assert!(summary_prompt[1].content.contains("### get_failed_batches"));
    assert!(summary_prompt[1].content.contains("### list_datasets"));
}

#[tokio::test]
async fn tool_error_is_recorded_and_turn_continues() {
    let model = ScriptedModel::configured(vec![tool_calls(vec![
        call("get_batch", json!({"batchId": "b-404"})),
        call("get_failed_batches", json!({})),
    ])]);
    // Summary call hits the exhausted script and falls back to templates.
    let (orch, exec) = setup(model);

    let a = answer(orch.handle_turn(TurnRequest::new("check b-404")).await.unwrap());
    assert_eq!(a.tools_used, ["get_batch", "get_failed_batches"]);
    assert!(a.content.starts_with("❌ **get_batch** failed: "));
    assert!(a.content.contains("batch not found"));
    assert!(a.content.contains("Great news!"));
    assert_eq!(a.data, Some(json!({"batches": []})));
    assert_eq!(exec.executed_names().len(), 2);
}

#[tokio::test]
async fn history_is_truncated_to_twenty_entries() {
    let model = ScriptedModel::configured(vec![Ok(LlmResponse::Text("ok".into()))]);
    let (orch, _) = setup(Arc::clone(&model));
    let history: Vec<_> = (0..45)
        .map(|i| {
            if i % 2 == 0 {
                ChatMessage::user(format!("u{i}"))
            } else {
                ChatMessage::assistant(format!("a{i}"))
            }
        })
        .collect();

    orch.handle_turn(TurnRequest::new("latest").with_history(history))
        .await
        .unwrap();

    let calls = model.calls.lock().unwrap();
    let (messages, _, _) = &calls[0];
    // system + 20 history + current message
    assert_eq!(messages.len(), 22);
    assert_eq!(messages[1].content, "a25");
    assert_eq!(messages[20].content, "u44");
    assert_eq!(messages[21].content, "latest");
}

// ── approval gate ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_approval_call_halts_scan_and_discards_earlier_results() {
    let model = ScriptedModel::configured(vec![tool_calls(vec![
        call("list_datasets", json!({})),
        call("get_failed_batches", json!({})),
        call("delete_dataset", json!({"datasetId": "ds-1"})),
        call("list_datasets", json!({"limit": 1})),
        call("create_dataset", json!({"name": "x"})),
    ])]);
    let (orch, exec) = setup(Arc::clone(&model));

    let resp = orch
        .handle_turn(TurnRequest::new("clean up ds-1"))
        .await
        .unwrap();

    let TurnResponse::PendingApproval(pending) = resp else {
        panic!("expected pending approval");
    };
    assert!(pending.requires_approval);
    assert_eq!(pending.action.tool_name, "delete_dataset");
    assert_eq!(pending.action.tool_arguments, json!({"datasetId": "ds-1"}));

    // Calls 1..k-1 ran, nothing after k did, and their results are not in
    // the pending response.
    assert_eq!(exec.executed_names(), ["list_datasets", "get_failed_batches"]);
    let v = serde_json::to_value(TurnResponse::PendingApproval(pending)).unwrap();
    assert!(v.get("data").is_none());
    assert!(v.get("toolsUsed").is_none());
    // No summary call was made.
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn auto_mode_never_returns_pending() {
    let model = ScriptedModel::configured(vec![tool_calls(vec![
        call("delete_dataset", json!({"datasetId": "ds-1"})),
        call("create_dataset", json!({"name": "x"})),
    ])]);
    let (orch, exec) = setup(model);

    let resp = orch
        .handle_turn(TurnRequest::new("recreate it").auto_mode(true))
        .await
        .unwrap();
    assert!(!resp.is_pending());
    assert_eq!(resp.tools_used(), ["delete_dataset", "create_dataset"]);
    assert_eq!(exec.executed_names(), ["delete_dataset", "create_dataset"]);
}

#[tokio::test]
async fn approved_action_round_trip() {
    let model = ScriptedModel::configured(vec![tool_calls(vec![call(
        "delete_dataset",
        json!({"datasetId": "ds-9"}),
    )])]);
    let (orch, exec) = setup(Arc::clone(&model));

    let first = orch.handle_turn(TurnRequest::new("delete ds-9")).await.unwrap();
    let TurnResponse::PendingApproval(pending) = first else {
        panic!("expected pending approval");
    };
    assert!(exec.executed_names().is_empty());

    // The caller echoes the pending action back; serialization round trip
    // mirrors what an HTTP client would do.
    let echoed = serde_json::from_value(serde_json::to_value(&pending.action).unwrap()).unwrap();
    let second = orch
        .handle_turn(TurnRequest::new("yes").approve(echoed))
        .await
        .unwrap();

    let a = answer(second);
    assert_eq!(a.tools_used, ["delete_dataset"]);
    assert_eq!(a.data, Some(json!({"deleted": "ds-9"})));
    let executed = exec.executed.lock().unwrap();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].1, json!({"datasetId": "ds-9"}));
    // Tool selection on the first turn, then only the summary attempt on the
    // approved turn (which falls back to templates on the exhausted script).
    assert_eq!(model.call_count(), 2);
}

#[tokio::test]
async fn approved_action_failure_is_error_shaped() {
    let (orch, _) = setup(ScriptedModel::unconfigured());
    let action = dataops_agent::PendingAction::for_call(None, "no_such_tool", &json!({}));

    let a = answer(
        orch.handle_turn(TurnRequest::default().approve(action))
            .await
            .unwrap(),
    );
    assert!(a.content.starts_with("❌ Failed to execute `no_such_tool`: "));
    assert_eq!(a.tools_used, ["no_such_tool"]);
}

#[tokio::test]
async fn empty_message_is_a_validation_error() {
    let (orch, _) = setup(ScriptedModel::unconfigured());
    let err = orch.handle_turn(TurnRequest::new("")).await.unwrap_err();
    assert!(matches!(err, AgentError::Validation { .. }));
}
