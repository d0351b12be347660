//! Subcommand: `dataops chat` -- interactive REPL.
//!
//! Each line is one turn.  History lives here, on the client side, and is
//! sent with every request.  A turn that stops at the approval gate asks
//! the operator before the action is sent back as approved.

use std::io::{self, BufRead, Write as _};

use anyhow::{Context, Result};
use tracing::info;

use dataops_agent::{ChatMessage, PendingAction, TurnRequest, TurnResponse};

use crate::helpers::Runtime;

/// Run the interactive REPL.
pub async fn cmd_chat(runtime: Runtime, auto_mode: bool) -> Result<()> {
    let orchestrator = runtime.orchestrator;
    let mut history: Vec<ChatMessage> = Vec::new();

    println!();
    println!("  DataOps Copilot v{}", env!("CARGO_PKG_VERSION"));
    println!("  Sandbox: {}", runtime.config.platform.sandbox);
    if !orchestrator.llm_configured() {
        println!("  No language model configured: keyword matching only.");
    }
    if auto_mode {
        println!("  Auto mode: destructive actions run without confirmation.");
    }
    println!("  Type your question, or 'quit' to exit.");
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        prompt("> ")?;
        let Some(line) = lines.next() else {
            println!();
            info!("EOF received, exiting");
            break;
        };
        let line = line.context("failed to read input")?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        let request = TurnRequest::new(trimmed)
            .auto_mode(auto_mode)
            .with_history(history.clone());
        let mut response = match orchestrator.handle_turn(request).await {
            Ok(r) => r,
            Err(e) => {
                eprintln!("  Error: {}\n", e.reason());
                continue;
            }
        };

        if let TurnResponse::PendingApproval(pending) = &response {
            let action = pending.action.clone();
            if !confirm(&action, &mut lines)? {
                println!("  Cancelled.\n");
                history.push(ChatMessage::user(trimmed));
                history.push(ChatMessage::assistant(format!(
                    "Cancelled `{}`.",
                    action.tool_name
                )));
                continue;
            }
            let approved = TurnRequest::new(trimmed)
                .with_history(history.clone())
                .approve(action);
            response = match orchestrator.handle_turn(approved).await {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("  Error: {}\n", e.reason());
                    continue;
                }
            };
        }

        println!("{}", response.content());
        if !response.tools_used().is_empty() {
            println!("  (tools: {})", response.tools_used().join(", "));
        }
        println!();

        history.push(ChatMessage::user(trimmed));
        history.push(ChatMessage::assistant(response.content()));
    }

    info!("shutting down");
    Ok(())
}

fn prompt(text: &str) -> Result<()> {
    print!("{text}");
    io::stdout().flush().context("failed to flush stdout")
}

/// Show the pending action and read a yes/no answer.
fn confirm(
    action: &PendingAction,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<bool> {
    println!("  ⚠️ This action needs your approval:");
    println!("     {}", action.action_description);
    prompt("  Proceed? [y/N] ")?;
    match lines.next() {
        Some(answer) => Ok(is_affirmative(&answer.context("failed to read input")?)),
        None => Ok(false),
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES \n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yeah sure"));
    }

    #[test]
    fn confirm_reads_one_line() {
        let action = PendingAction {
            tool_name: "delete_dataset".into(),
            tool_arguments: json!({"datasetId": "ds1"}),
            action_description: "Delete a dataset".into(),
        };
        let mut input = vec![Ok("y".to_owned()), Ok("next".to_owned())].into_iter();
        assert!(confirm(&action, &mut input).unwrap());
        assert_eq!(input.next().unwrap().unwrap(), "next");

        let mut empty = std::iter::empty::<io::Result<String>>();
        assert!(!confirm(&action, &mut empty).unwrap());
    }
}
