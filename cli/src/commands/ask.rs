//! # termgpt One-Shot Question (`ask`)
//!
//! File: cli/src/commands/ask.rs
//! Author: Christi Mahu
//!
//! Sends a single message in a fresh conversation and prints the labelled
//! reply. A failed turn prints `[error: ...]` and the command exits with a
//! non-zero status. A blank message does nothing.
//!
//! ```bash
//! termgpt ask what is a monad
//! termgpt ask --persona ultron "describe humanity in one line"
//! ```
//!
use crate::core::config::{self, ConfigOverrides};
use crate::core::error::Result;
use crate::core::service::{ChatService, SendOutcome};
use clap::Parser;
use std::io::Write;
use tracing::info;

#[derive(Parser, Debug)]
pub struct AskArgs {
    /// The message to send. Multiple words are joined with spaces.
    #[arg(required = true, num_args = 1.., value_name = "MESSAGE")]
    pub words: Vec<String>,
}

pub async fn handle_ask(args: AskArgs, overrides: &ConfigOverrides) -> Result<()> {
    let cfg = config::load_config(overrides)?;
    let service = ChatService::from_config(&cfg)?;
    let mut stdout = std::io::stdout();
    ask_once(&service, &args.words.join(" "), &mut stdout).await
}

async fn ask_once(service: &ChatService, message: &str, out: &mut impl Write) -> Result<()> {
    let mut session = service.new_conversation(None);
    info!(
        "One-shot message to persona '{}'",
        session.active_persona_id()
    );
    match service.send_user_message(&mut session, message).await {
        Ok(SendOutcome::Replied(reply)) => {
            writeln!(out, "{}", reply.display())?;
            Ok(())
        }
        Ok(SendOutcome::Ignored) => {
            info!("Blank message, nothing sent");
            Ok(())
        }
        Err(failure) => {
            writeln!(out, "[error: {}]", failure)?;
            out.flush()?;
            Err(anyhow::Error::new(failure).context("The question could not be answered"))
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::stub::ScriptedBackend;
    use crate::core::inference::InferenceFailure;
    use crate::core::persona::PersonaRegistry;
    use std::sync::Arc;

    fn service(backend: ScriptedBackend) -> ChatService {
        let registry = PersonaRegistry::builtin()
            .unwrap()
            .with_default("ultron");
        ChatService::new(Arc::new(registry), Arc::new(backend))
    }

    #[tokio::test]
    async fn test_ask_prints_reply_for_default_persona() {
        let service = service(ScriptedBackend::replying("ULTRON: Humanity!!! Obsolete."));
        let mut out = Vec::new();
        ask_once(&service, "describe humanity", &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "ULTRON: Humanity. Obsolete.\n");
    }

    #[tokio::test]
    async fn test_ask_failure_prints_error_and_fails() {
        let service = service(ScriptedBackend::new([Err(InferenceFailure::EmptyReply)]));
        let mut out = Vec::new();
        let err = ask_once(&service, "hello", &mut out).await.unwrap_err();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[error: backend returned an empty reply]\n"
        );
        assert_eq!(
            err.downcast_ref::<InferenceFailure>(),
            Some(&InferenceFailure::EmptyReply)
        );
    }

    #[tokio::test]
    async fn test_ask_blank_message_is_a_silent_no_op() {
        let backend = Arc::new(ScriptedBackend::default());
        let registry = Arc::new(PersonaRegistry::builtin().unwrap());
        let service = ChatService::new(registry, backend.clone());
        let mut out = Vec::new();
        ask_once(&service, "   ", &mut out).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(backend.calls(), 0);
    }
}
