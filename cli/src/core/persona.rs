//! # termgpt Persona Registry
//!
//! File: cli/src/core/persona.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! The registry is the single table of conversational personas. Each persona
//! carries a display label, a system prompt, a priming transcript used as
//! few-shot style examples, and the reply filter rules applied to the model's
//! output.
//!
//! Personas are data, not code: the built-in table lives in
//! `cli/assets/personas.toml` and is embedded in the binary. A personas file
//! named in the configuration replaces it. Either way the table is parsed and
//! validated once at startup and shared read-only (`Arc<PersonaRegistry>`).
//!
//! ## Invariants
//!
//! - persona ids are unique and the default id exists
//! - every priming transcript starts with exactly one system turn, built from
//!   `system_prompt`; the few-shot examples may not contain system turns
//! - command words (id, label, aliases; case-insensitive) select at most one persona
//!
//! ## Examples
//!
//! ```rust
//! let registry = PersonaRegistry::builtin()?;
//! let tars = registry.lookup(Some("tars"));
//! assert_eq!(tars.label, "TARS");
//!
//! // Unknown ids fall back to the default persona.
//! assert_eq!(registry.lookup(Some("hal9000")).id, registry.default_id());
//! ```
//!
use crate::core::config::PersonasConfig;
use crate::core::error::{RelayError, Result};
use crate::core::filter::FilterRules;
use crate::core::session::{Role, Turn};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

/// Persona table compiled into the binary.
const BUILTIN_PERSONAS: &str = include_str!("../../assets/personas.toml");

/// A named conversational persona.
#[derive(Debug, Clone, PartialEq)]
pub struct Persona {
    /// Stable short identifier, unique within the registry.
    pub id: String,
    /// Prefix shown in front of assistant replies (without the trailing colon).
    pub label: String,
    /// Text shown in the web terminal's persona menu.
    pub menu_name: String,
    /// Extra command words that select this persona.
    pub aliases: Vec<String>,
    pub system_prompt: String,
    /// Line printed by the dispatch surfaces when the persona is activated.
    pub greeting: Option<String>,
    /// Seed transcript for fresh sessions. Always starts with the system turn.
    pub priming: Vec<Turn>,
    pub rules: FilterRules,
}

impl Persona {
    /// Formats a reply body with this persona's label, e.g. `TARS: text`.
    pub fn labelled(&self, text: &str) -> String {
        format!("{}: {}", self.label, text)
    }
}

/// The id/label pair used for menus and `termgpt personas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonaSummary {
    pub id: String,
    pub label: String,
    pub menu_name: String,
}

/// On-disk layout of a persona table.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct PersonaTable {
    default: String,
    #[serde(rename = "persona", default)]
    personas: Vec<PersonaEntry>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct PersonaEntry {
    id: String,
    label: String,
    menu_name: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    system_prompt: String,
    greeting: Option<String>,
    #[serde(default)]
    rules: FilterRules,
    #[serde(default)]
    examples: Vec<Turn>,
}

/// Immutable, ordered table of personas with a designated default.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
    default_index: usize,
    /// Lowercased command word -> index into `personas`.
    command_words: HashMap<String, usize>,
}

impl PersonaRegistry {
    /// Parses the table embedded in the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_PERSONAS).context("Built-in persona table is invalid")
    }

    /// Loads the registry described by the `[personas]` configuration section:
    /// the configured file if any, otherwise the built-in table, then applies
    /// the configured default persona.
    pub fn load(config: &PersonasConfig) -> Result<Self> {
        let registry = match &config.file {
            Some(path) => Self::from_file(Path::new(path))?,
            None => Self::builtin()?,
        };
        Ok(match &config.default {
            Some(id) => registry.with_default(id),
            None => registry,
        })
    }

    /// Reads and validates a persona table from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading persona table from: {}", path.display());
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read persona file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid persona file: {}", path.display()))
    }

    /// Parses and validates a persona table from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let table: PersonaTable = toml::from_str(raw).map_err(RelayError::from)?;
        Ok(Self::from_table(table)?)
    }

    fn from_table(table: PersonaTable) -> std::result::Result<Self, RelayError> {
        if table.personas.is_empty() {
            return Err(RelayError::PersonaTable(
                "the table defines no personas".into(),
            ));
        }

        let mut seen_ids = HashSet::new();
        let mut command_words = HashMap::new();
        let mut personas = Vec::with_capacity(table.personas.len());

        for (index, entry) in table.personas.into_iter().enumerate() {
            let persona = build_persona(entry)?;
            if !seen_ids.insert(persona.id.clone()) {
                return Err(RelayError::PersonaTable(format!(
                    "duplicate persona id '{}'",
                    persona.id
                )));
            }

            let words = std::iter::once(persona.id.as_str())
                .chain(std::iter::once(persona.label.as_str()))
                .chain(persona.aliases.iter().map(String::as_str));
            for word in words {
                let key = word.trim().to_lowercase();
                if key.is_empty() {
                    continue;
                }
                match command_words.get(&key) {
                    Some(&owner) if owner != index => {
                        return Err(RelayError::PersonaTable(format!(
                            "command word '{}' of persona '{}' is already used by persona '{}'",
                            word, persona.id, personas_id_at(&personas, owner)
                        )));
                    }
                    Some(_) => {}
                    None => {
                        command_words.insert(key, index);
                    }
                }
            }

            debug!(
                "Registered persona '{}' ({} priming turns)",
                persona.id,
                persona.priming.len()
            );
            personas.push(persona);
        }

        let default_index = personas
            .iter()
            .position(|p| p.id == table.default)
            .ok_or_else(|| {
                RelayError::PersonaTable(format!(
                    "default persona '{}' is not defined",
                    table.default
                ))
            })?;

        Ok(Self {
            personas,
            default_index,
            command_words,
        })
    }

    /// Returns the registry with a different default persona. An unknown id
    /// keeps the table's own default.
    pub fn with_default(mut self, id: &str) -> Self {
        match self.personas.iter().position(|p| p.id == id) {
            Some(index) => self.default_index = index,
            None => warn!(
                "Configured default persona '{}' does not exist, keeping '{}'. Known personas: {}",
                id,
                self.default_id(),
                self.list_ids().join(", ")
            ),
        }
        self
    }

    pub fn default_id(&self) -> &str {
        &self.personas[self.default_index].id
    }

    pub fn default_persona(&self) -> &Persona {
        &self.personas[self.default_index]
    }

    /// Exact lookup without fallback.
    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    /// Looks up a persona, falling back to the default for unknown or absent ids.
    pub fn lookup(&self, id: Option<&str>) -> &Persona {
        match id.and_then(|id| self.get(id)) {
            Some(persona) => persona,
            None => {
                if let Some(unknown) = id {
                    debug!(
                        "Unknown persona '{}', falling back to '{}'",
                        unknown,
                        self.default_id()
                    );
                }
                self.default_persona()
            }
        }
    }

    /// Persona ids in table order.
    pub fn list_ids(&self) -> Vec<&str> {
        self.personas.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn list(&self) -> Vec<PersonaSummary> {
        self.personas
            .iter()
            .map(|p| PersonaSummary {
                id: p.id.clone(),
                label: p.label.clone(),
                menu_name: p.menu_name.clone(),
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    /// Every persona label, used to strip labels the model echoes back.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.personas.iter().map(|p| p.label.as_str())
    }

    /// Resolves a typed command word (id, label or alias, any case) to a persona.
    pub fn resolve_command(&self, word: &str) -> Option<&Persona> {
        self.command_words
            .get(&word.trim().to_lowercase())
            .map(|&index| &self.personas[index])
    }
}

fn personas_id_at(personas: &[Persona], index: usize) -> &str {
    personas.get(index).map(|p| p.id.as_str()).unwrap_or("?")
}

fn build_persona(entry: PersonaEntry) -> std::result::Result<Persona, RelayError> {
    let id = entry.id.trim().to_string();
    if id.is_empty() {
        return Err(RelayError::PersonaTable("persona id must not be empty".into()));
    }
    if entry.label.trim().is_empty() {
        return Err(RelayError::PersonaTable(format!(
            "persona '{}' has an empty label",
            id
        )));
    }
    if entry.system_prompt.trim().is_empty() {
        return Err(RelayError::PersonaTable(format!(
            "persona '{}' has an empty system prompt",
            id
        )));
    }
    if entry.examples.iter().any(|turn| turn.role == Role::System) {
        return Err(RelayError::PersonaTable(format!(
            "persona '{}' has a system turn among its examples; use system_prompt instead",
            id
        )));
    }
    if entry.rules.max_words == Some(0) {
        return Err(RelayError::PersonaTable(format!(
            "persona '{}' sets max_words to 0",
            id
        )));
    }

    let mut priming = Vec::with_capacity(entry.examples.len() + 1);
    priming.push(Turn::system(entry.system_prompt.clone()));
    priming.extend(entry.examples);

    Ok(Persona {
        menu_name: entry.menu_name.unwrap_or_else(|| entry.label.clone()),
        label: entry.label.trim().to_string(),
        id,
        aliases: entry.aliases,
        system_prompt: entry.system_prompt,
        greeting: entry.greeting,
        priming,
        rules: entry.rules,
    })
}
