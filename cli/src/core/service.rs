//! # termgpt Chat Service
//!
//! File: cli/src/core/service.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! `ChatService` is the contract every dispatch surface (the `chat` REPL, the
//! `ask` one-shot command, the `srv` HTTP handlers) talks to. It ties the
//! persona registry, the reply filter and the inference backend together and
//! operates on a `Conversation` owned by the caller.
//!
//! ## Turn pipeline
//!
//! 1. Append the user's text to the conversation (blank text: nothing happens,
//!    no backend call)
//! 2. Send the whole transcript to the backend
//! 3. Filter the raw reply under the active persona's rules
//! 4. Append the filtered reply as an assistant turn and return it
//!
//! When step 2 fails the user turn stays and no assistant turn is added, so
//! the user can simply send again.
//!
//! One call per conversation at a time: `send_user_message` takes the
//! conversation by `&mut`, and the HTTP surface guards each session with a
//! lock.
//!
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::filter::ReplyFilter;
use crate::core::inference::{ChatBackend, InferenceFailure, OllamaClient};
use crate::core::persona::{Persona, PersonaRegistry, PersonaSummary};
use crate::core::session::Conversation;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A filtered assistant reply plus the label the surface should show with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub label: String,
    pub text: String,
}

impl Reply {
    /// `LABEL: text`, the way the terminals print replies.
    pub fn display(&self) -> String {
        format!("{}: {}", self.label, self.text)
    }
}

/// Result of a successful `send_user_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Replied(Reply),
    /// The message was blank; nothing was sent or recorded.
    Ignored,
}

#[derive(Clone)]
pub struct ChatService {
    registry: Arc<PersonaRegistry>,
    filter: Arc<ReplyFilter>,
    backend: Arc<dyn ChatBackend>,
}

impl ChatService {
    pub fn new(registry: Arc<PersonaRegistry>, backend: Arc<dyn ChatBackend>) -> Self {
        let filter = Arc::new(ReplyFilter::for_registry(&registry));
        Self {
            registry,
            filter,
            backend,
        }
    }

    /// Builds the service the binary runs with: the configured persona table
    /// and an Ollama client for the configured backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Arc::new(PersonaRegistry::load(&config.personas)?);
        let client = OllamaClient::from_config(&config.backend)?;
        info!(
            "Loaded {} personas, default '{}', model '{}'",
            registry.list_ids().len(),
            registry.default_id(),
            client.model()
        );
        Ok(Self::new(registry, Arc::new(client)))
    }

    pub fn registry(&self) -> &Arc<PersonaRegistry> {
        &self.registry
    }

    /// A fresh conversation, seeded with `persona_id` or the default persona.
    pub fn new_conversation(&self, persona_id: Option<&str>) -> Conversation {
        Conversation::with_persona(self.registry.clone(), persona_id)
    }

    /// Switches `session` to `persona_id` (default persona if unknown) and
    /// reseeds its transcript.
    pub fn set_persona<'s>(&self, session: &'s mut Conversation, persona_id: &str) -> &'s Persona {
        session.start(persona_id)
    }

    pub fn list_personas(&self) -> Vec<PersonaSummary> {
        self.registry.list()
    }

    /// Runs one user turn through the backend and the reply filter.
    pub async fn send_user_message(
        &self,
        session: &mut Conversation,
        text: &str,
    ) -> std::result::Result<SendOutcome, InferenceFailure> {
        if session.append_user(text).is_err() {
            debug!("Ignoring blank user message");
            return Ok(SendOutcome::Ignored);
        }

        let raw = match self.backend.complete(session.snapshot()).await {
            Ok(raw) => raw,
            Err(failure) => {
                warn!(
                    "Turn failed for persona '{}' ({}): {}",
                    session.active_persona_id(),
                    failure.kind(),
                    failure
                );
                return Err(failure);
            }
        };

        let persona = session.active_persona();
        let reply = Reply {
            label: persona.label.clone(),
            text: self.filter.apply(&raw, persona),
        };
        debug!(
            "Persona '{}' reply: {} raw chars -> {} filtered chars",
            persona.id,
            raw.chars().count(),
            reply.text.chars().count()
        );
        session.append_assistant(reply.text.clone());
        Ok(SendOutcome::Replied(reply))
    }
}
