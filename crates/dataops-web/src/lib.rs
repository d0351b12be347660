//! HTTP API for DataOps Copilot.
//!
//! This crate exposes the turn orchestrator and the query service over a
//! small JSON API:
//!
//! - `GET /api/status` and `GET /api/tools` for discovery.
//! - `POST /api/chat` for one turn of the conversation.
//! - `POST /api/queries` and `GET /api/queries/{id}` for query jobs.

pub mod api;
pub mod server;
pub mod state;

pub use server::{WebServer, router};
pub use state::AppState;

use dataops_agent::config::WebSettings;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl From<&WebSettings> for WebConfig {
    fn from(settings: &WebSettings) -> Self {
        Self {
            bind_addr: settings.bind_addr.clone(),
            port: settings.port,
        }
    }
}
