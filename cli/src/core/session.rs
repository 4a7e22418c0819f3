//! # termgpt Conversation Session
//!
//! File: cli/src/core/session.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! A `Conversation` is the mutable transcript of one chat, bound to the
//! persona that is currently active. It owns the persona choice explicitly;
//! there is no process-wide mode switch. Each dispatch surface holds its own
//! conversations (one for the REPL, one per browser session for `srv`).
//!
//! ## Lifecycle
//!
//! - created bound to the default persona (or a requested one) and seeded with
//!   that persona's priming transcript
//! - grows by user and assistant turns
//! - `start` throws the transcript away and reseeds it, which is what a persona
//!   switch or a `reset` does
//!
//! The transcript never shrinks by partial deletion and always begins with the
//! active persona's system turn.
//!
use crate::core::persona::{Persona, PersonaRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Speaker of a turn. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyUserInput,
}

/// Transcript bound to a persona.
#[derive(Debug, Clone)]
pub struct Conversation {
    registry: Arc<PersonaRegistry>,
    active_persona_id: String,
    transcript: Vec<Turn>,
}

impl Conversation {
    /// Creates a conversation for `persona_id`, falling back to the default persona.
    pub fn with_persona(registry: Arc<PersonaRegistry>, persona_id: Option<&str>) -> Self {
        let persona = registry.lookup(persona_id);
        let active_persona_id = persona.id.clone();
        let transcript = persona.priming.clone();
        Self {
            registry,
            active_persona_id,
            transcript,
        }
    }

    /// Resets the transcript to the persona's priming and makes it active.
    /// Unknown ids select the default persona.
    pub fn start(&mut self, persona_id: &str) -> &Persona {
        let persona = self.registry.lookup(Some(persona_id));
        debug!(
            "Starting conversation with persona '{}' (requested '{}')",
            persona.id, persona_id
        );
        self.active_persona_id = persona.id.clone();
        self.transcript = persona.priming.clone();
        persona
    }

    /// Appends a user turn. Input that is empty after trimming is rejected.
    pub fn append_user(&mut self, text: &str) -> Result<(), SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyUserInput);
        }
        self.transcript.push(Turn::user(text));
        Ok(())
    }

    /// Appends an assistant turn verbatim.
    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.transcript.push(Turn::assistant(text));
    }

    /// The transcript as sent to the inference backend.
    pub fn snapshot(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn active_persona_id(&self) -> &str {
        &self.active_persona_id
    }

    pub fn active_persona(&self) -> &Persona {
        self.registry.lookup(Some(&self.active_persona_id))
    }
}
