//! CLI entry point for DataOps Copilot.
//!
//! This binary provides the `dataops` command with subcommands for serving
//! the HTTP API, chatting in the terminal, and listing tools.

mod cli;
mod helpers;
mod repl;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dataops_web::{AppState, WebConfig, WebServer};

use crate::cli::{Cli, Commands};
use crate::helpers::{Runtime, build_runtime, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, port } => {
            init_tracing("info");
            let runtime = build_runtime(&cli.config)?;
            cmd_serve(runtime, bind, port).await
        }
        Commands::Chat { auto } => {
            init_tracing("warn");
            let runtime = build_runtime(&cli.config)?;
            repl::cmd_chat(runtime, auto).await
        }
        Commands::Tools => {
            init_tracing("warn");
            let runtime = build_runtime(&cli.config)?;
            cmd_tools(&runtime);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(runtime: Runtime, bind: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = WebConfig::from(&runtime.config.web);
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let state = AppState::new(runtime.orchestrator, runtime.queries, config);
    let server = WebServer::new(state);
    info!(addr = %server.addr(), "DataOps Copilot API");

    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("web server failed")
}

// ---------------------------------------------------------------------------
// Subcommand: tools
// ---------------------------------------------------------------------------

fn cmd_tools(runtime: &Runtime) {
    println!();
    println!("  Available tools");
    println!("  ===============");
    println!();
    for def in runtime.orchestrator.registry().definitions() {
        let marker = if def.requires_approval { " (approval)" } else { "" };
        println!("  {:<20} {}{marker}", def.name, def.description);
    }
    println!();
}
