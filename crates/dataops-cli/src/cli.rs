//! CLI argument definitions for DataOps Copilot.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dataops_agent::config::DEFAULT_CONFIG_PATH;

/// DataOps Copilot -- a conversational assistant for data platform operations.
#[derive(Parser)]
#[command(
    name = "dataops",
    version,
    about = "DataOps Copilot -- conversational data platform operations",
    long_about = "Ask about datasets, batches, schemas and queries in plain language. \
                  Destructive actions always ask for confirmation first."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Address to bind to (overrides `[web] bind_addr`).
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides `[web] port`).
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat with the copilot in the terminal.
    Chat {
        /// Run approval-gated tools without asking.
        #[arg(long)]
        auto: bool,
    },

    /// List the available tools.
    Tools,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::parse_from(["dataops", "serve", "--port", "8088"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        match cli.command {
            Commands::Serve { bind, port } => {
                assert_eq!(bind, None);
                assert_eq!(port, Some(8088));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["dataops", "chat", "--auto", "--config", "ops.toml"]);
        assert_eq!(cli.config, PathBuf::from("ops.toml"));
        assert!(matches!(cli.command, Commands::Chat { auto: true }));
    }
}
