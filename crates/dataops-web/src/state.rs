//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  Nothing in it is mutable: conversation history travels with
//! each request, so handlers never coordinate.

use std::sync::Arc;
use std::time::Instant;

use dataops_adapters::QueryService;
use dataops_agent::TurnOrchestrator;

use crate::WebConfig;

/// Shared state accessible from every Axum handler.
pub struct AppState {
    /// Runs one conversation turn per `/api/chat` request.
    pub orchestrator: Arc<TurnOrchestrator>,

    /// Submits and polls query jobs for `/api/queries`.
    pub queries: QueryService,

    /// Web server configuration.
    pub config: WebConfig,

    /// Server start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<TurnOrchestrator>, queries: QueryService, config: WebConfig) -> Self {
        Self {
            orchestrator,
            queries,
            config,
            started_at: Instant::now(),
        }
    }
}
