//! REST API route handlers.
//!
//! Provides endpoints for system status, tool discovery, one-shot chat
//! turns and query jobs.  Handlers answer with `(StatusCode, Json<Value>)`
//! and errors are reported as `{"error": "..."}`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};

use dataops_adapters::{AdapterError, QuerySpec};
use dataops_agent::{AgentError, TurnRequest};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tool_count: usize,
    pub llm_configured: bool,
    pub uptime_seconds: u64,
}

/// Return basic system status information.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let llm_configured = state.orchestrator.llm_configured();
    Json(StatusResponse {
        // Without a model, turns still work through the rule matcher.
        status: if llm_configured { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        tool_count: state.orchestrator.registry().len(),
        llm_configured,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/tools
// ---------------------------------------------------------------------------

/// List every registered tool with its schema and approval flag.
pub async fn tools(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "tools": state.orchestrator.registry().definitions() }))
}

// ---------------------------------------------------------------------------
// POST /api/chat
// ---------------------------------------------------------------------------

/// Run one conversation turn.
///
/// The body is a turn request (`message`, optional `history`, `autoMode`
/// and `approvedAction`).  The response is either an answer or a pending
/// approval request.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TurnRequest>,
) -> (StatusCode, Json<Value>) {
    match state.orchestrator.handle_turn(request).await {
        Ok(response) => match serde_json::to_value(&response) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => {
            let status = agent_status(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, "chat turn failed");
            }
            error_body(status, e.reason())
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/queries, GET /api/queries/{id}
// ---------------------------------------------------------------------------

/// Submit a query and wait for it within the poll budget.
///
/// A job that outlives the budget is returned with `"polling": true` so the
/// caller can follow up with `GET /api/queries/{id}`.
pub async fn submit_query(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<QuerySpec>,
) -> (StatusCode, Json<Value>) {
    if spec.sql.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "`sql` is required".into());
    }

    match state.queries.run(&spec).await {
        Ok(outcome) => {
            tracing::info!(
                job_id = %outcome.job().id,
                state = %outcome.job().state,
                complete = outcome.is_complete(),
                "query finished polling"
            );
            match serde_json::to_value(&outcome) {
                Ok(body) => (StatusCode::OK, Json(body)),
                Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "query submission failed");
            error_body(agent_status(&e), e.reason())
        }
    }
}

/// Current state of a query job.
pub async fn get_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.queries.status(&id).await {
        Ok(job) => match serde_json::to_value(&job) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => {
            tracing::warn!(job_id = %id, error = %e, "query status failed");
            error_body(adapter_status(&e), e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn error_body(status: StatusCode, message: String) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message })))
}

fn agent_status(err: &AgentError) -> StatusCode {
    match err {
        AgentError::Validation { .. } => StatusCode::BAD_REQUEST,
        AgentError::UnknownTool { .. } => StatusCode::NOT_FOUND,
        AgentError::ToolExecution { .. } | AgentError::JobPollFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Platform 404s pass through; every other platform failure is a 502.
fn adapter_status(err: &AdapterError) -> StatusCode {
    if matches!(err, AdapterError::InvalidId { .. }) {
        return StatusCode::BAD_REQUEST;
    }
    match err.status() {
        Some(404) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}
