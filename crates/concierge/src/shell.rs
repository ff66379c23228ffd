// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `concierge chat` command implementation.
//!
//! Launches an interactive REPL with readline history that streams each
//! reply as it is generated. The client side keeps the transcript and sends
//! it with every request, the way a web widget would. Ctrl+C while a reply
//! is streaming cancels that reply only.

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use concierge_agent::{ChatEngine, ChatEvent, ChatRequest};
use concierge_config::ConciergeConfig;
use concierge_core::{ChatTurn, ConciergeError};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::SessionArgs;
use crate::commands::session_request;
use crate::services::build_engine;

/// Runs the `concierge chat` interactive REPL.
pub async fn run_chat(config: &ConciergeConfig, session: SessionArgs) -> Result<(), ConciergeError> {
    let (engine, report) = build_engine(config).await?;

    let mut session = session;
    let conversation = session
        .conversation
        .take()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    session.conversation = Some(conversation.clone());

    let mut rl = DefaultEditor::new()
        .map_err(|e| ConciergeError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "concierge chat".bold().green());
    println!(
        "{}",
        format!(
            "conversation {conversation} | {} products | actions {}",
            report.products,
            if session.allow_actions { "enabled" } else { "disabled" }
        )
        .dimmed()
    );
    println!("Type {} to exit, {} to start over.\n", "/quit".yellow(), "/new".yellow());

    let mut turns: Vec<ChatTurn> = Vec::new();
    let prompt = format!("{}> ", "you".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                match trimmed {
                    "" => continue,
                    "/quit" | "/exit" => break,
                    "/new" => {
                        turns.clear();
                        let id = uuid::Uuid::new_v4().to_string();
                        println!("{}", format!("new conversation {id}").dimmed());
                        session.conversation = Some(id);
                        continue;
                    }
                    _ => {}
                }
                let _ = rl.add_history_entry(&line);

                turns.push(ChatTurn::user(trimmed));
                let request = session_request(turns.clone(), &session);
                if let Some(reply) = stream_reply(engine.clone(), request).await {
                    turns.push(ChatTurn::assistant(reply));
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }
    Ok(())
}

/// Streams one reply to stdout and returns its final text.
async fn stream_reply(engine: Arc<ChatEngine>, request: ChatRequest) -> Option<String> {
    let cancel = CancellationToken::new();
    let mut rx = engine.chat_stream(request, cancel.clone());
    let mut printer = EventPrinter::default();
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                if let Some(out) = printer.render(&event) {
                    print!("{out}");
                    let _ = stdout.flush();
                }
                if event.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                println!("\n{}", "(interrupted)".dimmed());
                break;
            }
        }
    }
    printer.finish()
}

/// Turns stream events into terminal output, remembering the reply text.
#[derive(Debug, Default)]
struct EventPrinter {
    streamed: String,
    final_text: Option<String>,
}

impl EventPrinter {
    fn render(&mut self, event: &ChatEvent) -> Option<String> {
        match event {
            ChatEvent::UserUpdate { name } => {
                Some(format!("{}\n", format!("(talking with {name})").dimmed()))
            }
            ChatEvent::Delta { text } => {
                let prefix = if self.streamed.is_empty() {
                    "concierge> ".cyan().to_string()
                } else {
                    String::new()
                };
                self.streamed.push_str(text);
                Some(format!("{prefix}{text}"))
            }
            ChatEvent::ToolCall { name, arguments } => {
                Some(format!("\n{}\n", format!("[tool {name} {arguments}]").dimmed()))
            }
            ChatEvent::ActionEvent { action, .. } => {
                Some(format!("{}\n", format!("[action {action}]").dimmed()))
            }
            ChatEvent::Final { text, .. } => {
                self.final_text = Some(text.clone());
                let text = text.trim();
                if text.is_empty() || self.streamed.trim_end().ends_with(text) {
                    Some("\n".to_string())
                } else {
                    Some(format!("\n{} {text}\n", "concierge>".cyan()))
                }
            }
            ChatEvent::Error { message } => {
                Some(format!("\n{}: {message}\n", "error".red()))
            }
            ChatEvent::Done => {
                debug!("reply finished");
                None
            }
        }
    }

    /// The reply to keep in the transcript: the final text, else whatever
    /// streamed before the reply stopped.
    fn finish(self) -> Option<String> {
        self.final_text
            .filter(|t| !t.trim().is_empty())
            .or_else(|| Some(self.streamed.trim().to_string()).filter(|t| !t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn final_event(text: &str) -> ChatEvent {
        ChatEvent::Final {
            text: text.into(),
            action: None,
            action_data: None,
        }
    }

    #[test]
    fn streamed_answer_is_not_printed_twice() {
        let mut p = EventPrinter::default();
        let out = p.render(&ChatEvent::Delta { text: "Hello ".into() }).unwrap();
        assert!(out.contains("concierge>"));
        assert_eq!(
            p.render(&ChatEvent::Delta { text: "there".into() }).as_deref(),
            Some("there")
        );
        assert_eq!(p.render(&final_event("Hello there")).as_deref(), Some("\n"));
        assert_eq!(p.render(&ChatEvent::Done), None);
        assert_eq!(p.finish().as_deref(), Some("Hello there"));
    }

    #[test]
    fn unstreamed_final_text_is_printed() {
        let mut p = EventPrinter::default();
        p.render(&ChatEvent::Delta { text: "Sure.".into() });
        let out = p
            .render(&final_event("Please confirm before I send it."))
            .unwrap();
        assert!(out.contains("Please confirm before I send it."));
        assert_eq!(p.finish().as_deref(), Some("Please confirm before I send it."));
    }

    #[test]
    fn tool_and_action_lines_are_annotated() {
        let mut p = EventPrinter::default();
        let out = p
            .render(&ChatEvent::ToolCall {
                name: "product_search".into(),
                arguments: json!({"query": "lamp"}),
            })
            .unwrap();
        assert!(out.contains("tool product_search"));
        let out = p
            .render(&ChatEvent::ActionEvent {
                action: "send_inquiry".into(),
                action_data: json!({}),
            })
            .unwrap();
        assert!(out.contains("action send_inquiry"));
    }

    #[test]
    fn failed_reply_keeps_partial_text() {
        let mut p = EventPrinter::default();
        p.render(&ChatEvent::Delta { text: " partial ".into() });
        let out = p
            .render(&ChatEvent::Error {
                message: "provider error: boom".into(),
            })
            .unwrap();
        assert!(out.contains("provider error: boom"));
        assert_eq!(p.finish().as_deref(), Some("partial"));
    }

    #[test]
    fn empty_reply_yields_nothing() {
        let p = EventPrinter::default();
        assert_eq!(p.finish(), None);
    }
}
