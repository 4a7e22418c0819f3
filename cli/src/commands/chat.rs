//! # termgpt Interactive Chat (`chat`)
//!
//! File: cli/src/commands/chat.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Runs the terminal REPL. Every line read from stdin is first checked
//! against the REPL's commands; anything else is sent to the model as a user
//! message and the filtered reply is printed as `LABEL: text`.
//!
//! ## Commands
//!
//! Matched case-insensitively on the whole (trimmed) line:
//! - `exit`, `quit`: leave (prints `terminated`)
//! - `clear`: clear the screen, keep the conversation
//! - `reset`: start over with the current persona
//! - `personas`, `help`: list personas and commands
//! - any persona id, label or alias (`tars`, `C-3PO`, `ai` ...): switch persona
//!
//! EOF and Ctrl+C at the prompt also leave. Ctrl+C while waiting for a reply
//! abandons that reply; the user message stays in the transcript.
//!
//! ## Examples
//!
//! ```bash
//! termgpt chat
//! termgpt chat --persona tars
//! TERMGPT_MODEL=mistral termgpt -v chat
//! ```
//!
use crate::core::config::{self, ConfigOverrides};
use crate::core::error::Result;
use crate::core::persona::{Persona, PersonaRegistry};
use crate::core::service::{ChatService, SendOutcome};
use crate::core::session::Conversation;
use anyhow::Context;
use clap::Parser;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Arguments for `termgpt chat`. The persona is picked with the global `--persona`.
#[derive(Parser, Debug, Default)]
pub struct ChatArgs {
    /// Do not print the banner and command summary on start.
    #[arg(long, short)]
    pub quiet: bool,
}

/// What a line typed at the prompt means.
#[derive(Debug, PartialEq)]
pub enum ReplCommand<'a> {
    Exit,
    ClearScreen,
    Reset,
    ListPersonas,
    SwitchPersona(&'a Persona),
    Message(&'a str),
    Blank,
}

impl<'a> ReplCommand<'a> {
    pub fn parse(line: &'a str, registry: &'a PersonaRegistry) -> Self {
        let word = line.trim();
        if word.is_empty() {
            return ReplCommand::Blank;
        }
        match word.to_lowercase().as_str() {
            "exit" | "quit" => ReplCommand::Exit,
            "clear" => ReplCommand::ClearScreen,
            "reset" => ReplCommand::Reset,
            "personas" | "help" => ReplCommand::ListPersonas,
            _ => match registry.resolve_command(word) {
                Some(persona) => ReplCommand::SwitchPersona(persona),
                None => ReplCommand::Message(line),
            },
        }
    }
}

pub async fn handle_chat(args: ChatArgs, overrides: &ConfigOverrides) -> Result<()> {
    let cfg = config::load_config(overrides)?;
    let service = ChatService::from_config(&cfg)?;
    let session = service.new_conversation(None);
    info!("Starting chat with persona '{}'", session.active_persona_id());

    let mut stdout = std::io::stdout();
    if !args.quiet {
        print_banner(&mut stdout, &service, &cfg.backend.model)?;
    }
    let stdin = BufReader::new(tokio::io::stdin());
    run_repl(&service, session, stdin, &mut stdout).await
}

fn print_banner(out: &mut impl Write, service: &ChatService, model: &str) -> Result<()> {
    writeln!(out, "termgpt ({})", model)?;
    let words: Vec<String> = service
        .registry()
        .iter()
        .map(|p| p.label.clone())
        .collect();
    writeln!(
        out,
        "Commands: {} (switch persona), reset, clear, personas, exit\n",
        words.join(", ")
    )?;
    Ok(())
}

/// Reads lines from `input` until `exit`, EOF or Ctrl+C, writing everything
/// the user sees to `out`.
pub async fn run_repl<R, W>(
    service: &ChatService,
    mut session: Conversation,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    announce_persona(out, session.active_persona())?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => {
                debug!("Ctrl+C at the prompt");
                writeln!(out)?;
                None
            }
        };
        let Some(line) = line else {
            writeln!(out, "terminated")?;
            break;
        };

        match ReplCommand::parse(&line, service.registry()) {
            ReplCommand::Exit => {
                writeln!(out, "terminated")?;
                break;
            }
            ReplCommand::Blank => {}
            ReplCommand::ClearScreen => {
                write!(out, "{}", CLEAR_SCREEN)?;
            }
            ReplCommand::Reset => {
                let id = session.active_persona_id().to_string();
                let persona = service.set_persona(&mut session, &id);
                writeln!(out, "[{} conversation reset]", persona.label)?;
            }
            ReplCommand::ListPersonas => {
                write_persona_list(out, service.registry(), session.active_persona_id())?;
            }
            ReplCommand::SwitchPersona(persona) => {
                let persona = service.set_persona(&mut session, &persona.id);
                announce_persona(out, persona)?;
            }
            ReplCommand::Message(text) => {
                let outcome = tokio::select! {
                    outcome = service.send_user_message(&mut session, text) => Some(outcome),
                    _ = tokio::signal::ctrl_c() => None,
                };
                match outcome {
                    Some(Ok(SendOutcome::Replied(reply))) => writeln!(out, "{}", reply.display())?,
                    Some(Ok(SendOutcome::Ignored)) => {}
                    Some(Err(failure)) => writeln!(out, "[error: {}]", failure)?,
                    None => writeln!(out, "\n[cancelled]")?,
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn announce_persona(out: &mut impl Write, persona: &Persona) -> Result<()> {
    writeln!(out, "[{} mode activated]", persona.label)?;
    if let Some(greeting) = &persona.greeting {
        writeln!(out, "{}", persona.labelled(greeting))?;
    }
    Ok(())
}

fn write_persona_list(
    out: &mut impl Write,
    registry: &PersonaRegistry,
    active_id: &str,
) -> Result<()> {
    for persona in registry.iter() {
        let marker = if persona.id == active_id { "*" } else { " " };
        writeln!(
            out,
            "{} {:<10} {:<8} {}",
            marker, persona.id, persona.label, persona.menu_name
        )?;
    }
    writeln!(out, "Type a persona name to switch; reset, clear, exit.")?;
    Ok(())
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::stub::ScriptedBackend;
    use crate::core::inference::InferenceFailure;
    use crate::core::session::{Role, Turn};
    use std::sync::Arc;

    fn service(backend: Arc<ScriptedBackend>) -> ChatService {
        let registry = Arc::new(PersonaRegistry::builtin().unwrap());
        ChatService::new(registry, backend)
    }

    async fn run(service: &ChatService, script: &str) -> String {
        let session = service.new_conversation(None);
        let mut out = Vec::new();
        run_repl(service, session, script.as_bytes(), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        let reg = PersonaRegistry::builtin().unwrap();
        assert_eq!(ReplCommand::parse(" EXIT ", &reg), ReplCommand::Exit);
        assert_eq!(ReplCommand::parse("quit", &reg), ReplCommand::Exit);
        assert_eq!(ReplCommand::parse("Clear", &reg), ReplCommand::ClearScreen);
        assert_eq!(ReplCommand::parse("reset", &reg), ReplCommand::Reset);
        assert_eq!(ReplCommand::parse("help", &reg), ReplCommand::ListPersonas);
        assert_eq!(ReplCommand::parse("   ", &reg), ReplCommand::Blank);
        assert_eq!(
            ReplCommand::parse("TARS", &reg),
            ReplCommand::SwitchPersona(reg.lookup(Some("tars")))
        );
        assert_eq!(
            ReplCommand::parse("c-3po", &reg),
            ReplCommand::SwitchPersona(reg.lookup(Some("c3po")))
        );
        assert_eq!(
            ReplCommand::parse("tars, help me", &reg),
            ReplCommand::Message("tars, help me")
        );
    }

    #[tokio::test]
    async fn test_message_prints_labelled_reply() {
        let backend = Arc::new(ScriptedBackend::replying("Hi there!"));
        let service = service(backend.clone());
        let output = run(&service, "hello\nexit\n").await;
        assert!(output.starts_with("[AI mode activated]\n"));
        assert!(output.contains("> AI: Hi there!\n"));
        assert!(output.ends_with("terminated\n"));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_switch_persona_greets_and_reseeds() {
        let backend = Arc::new(ScriptedBackend::replying("TARS: Fine!!!"));
        let service = service(backend.clone());
        let output = run(&service, "tars\nwhat now\n").await;
        assert!(output.contains("[TARS mode activated]\n"));
        assert!(output.contains("TARS: Finally. Someone with taste. What do you need?\n"));
        assert!(output.contains("TARS: Fine.\n"));

        let sent = backend.last_transcript().unwrap();
        assert_eq!(sent.len(), 6);
        assert_eq!(sent[5], Turn::user("what now"));
        // EOF ends the loop.
        assert!(output.ends_with("terminated\n"));
    }

    #[tokio::test]
    async fn test_failure_prints_error_and_continues() {
        let backend = Arc::new(ScriptedBackend::new([
            Err(InferenceFailure::BackendUnreachable("connection refused".into())),
            Ok("Back online".into()),
        ]));
        let service = service(backend.clone());
        let output = run(&service, "one\ntwo\nquit\n").await;
        assert!(output.contains("[error: backend unreachable: connection refused]\n"));
        assert!(output.contains("AI: Back online\n"));

        // The failed user turn stays ahead of the second one.
        let sent = backend.last_transcript().unwrap();
        let users: Vec<&str> = sent
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(users, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_blank_lines_and_commands_never_reach_backend() {
        let backend = Arc::new(ScriptedBackend::default());
        let service = service(backend.clone());
        let output = run(&service, "\n   \nclear\npersonas\nreset\nexit\n").await;
        assert!(output.contains(CLEAR_SCREEN));
        assert!(output.contains("* normal"));
        assert!(output.contains("[AI conversation reset]"));
        assert_eq!(backend.calls(), 0);
    }
}
