//! # termgpt Reply Filter
//!
//! File: cli/src/core/filter.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Normalizes a raw model reply before it is shown and stored. The filter is a
//! pure function of the raw text and the active persona's `FilterRules`:
//!
//! 1. Empty or whitespace-only input becomes the placeholder `...`
//! 2. Surrounding whitespace is trimmed
//! 3. With `flatten_tone`, a fixed set of emoji is removed and every run of
//!    `!` becomes a single `.`
//! 4. Persona labels the model echoed at the start (`TARS:`, `AI:` ...) are
//!    removed, repeatedly, case-insensitively
//! 5. With `max_words`, the reply is cut to its first N words
//! 6. An empty result becomes the placeholder again
//!
//! Adding the persona label in front of the reply is left to the dispatch
//! surfaces, so stored assistant turns hold the body text only.
//!
//! Applying the filter to its own output returns the same text.
//!
use crate::core::persona::{Persona, PersonaRegistry};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shown instead of an empty assistant reply.
pub const PLACEHOLDER: &str = "...";

/// Glyphs removed from replies of personas with `flatten_tone`. `❤️` is the
/// heavy heart followed by the emoji variation selector, so both are listed.
pub const STRIPPED_EMOJI: &[char] = &[
    '😊', '😄', '😂', '🤣', '😁', '😃', '😆', '😉', '🙂', '😍', '🥰', '🤩', '🎉', '✨', '🙌',
    '👍', '\u{2764}', '\u{FE0F}',
];

/// Per-persona reply rules, read from the `[persona.rules]` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterRules {
    /// Deadpan delivery: strip emoji and turn `!` runs into a period.
    #[serde(default)]
    pub flatten_tone: bool,
    /// Optional cap on the number of words in a reply.
    #[serde(default)]
    pub max_words: Option<usize>,
}

/// Reply normalizer. Built once from the registry's labels and shared.
#[derive(Debug, Clone)]
pub struct ReplyFilter {
    echoed_label: Option<Regex>,
    exclamations: Option<Regex>,
}

impl ReplyFilter {
    /// Builds a filter that strips any of the given labels when a reply starts with them.
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut labels: Vec<String> = labels
            .into_iter()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(regex::escape)
            .collect();
        // Longest first so overlapping labels prefer the complete match.
        labels.sort_by_key(|l| std::cmp::Reverse(l.len()));
        labels.dedup();

        let echoed_label = if labels.is_empty() {
            None
        } else {
            let pattern = format!(r"^(?i)(?:{})\s*:\s*", labels.join("|"));
            match Regex::new(&pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Echoed-label stripping disabled, bad pattern '{}': {}", pattern, e);
                    None
                }
            }
        };

        let exclamations = match Regex::new("!+") {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Exclamation flattening disabled: {}", e);
                None
            }
        };

        Self {
            echoed_label,
            exclamations,
        }
    }

    /// Builds a filter that knows every label in the registry.
    pub fn for_registry(registry: &PersonaRegistry) -> Self {
        Self::new(registry.labels())
    }

    /// Normalizes `raw` for display under `persona`.
    pub fn apply(&self, raw: &str, persona: &Persona) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return PLACEHOLDER.to_string();
        }

        let mut text = trimmed.to_string();
        if persona.rules.flatten_tone {
            text = self.flatten_tone(&text);
        }
        text = self.strip_echoed_labels(&text);
        if let Some(limit) = persona.rules.max_words {
            text = cap_words(&text, limit);
        }

        let text = text.trim();
        if text.is_empty() {
            PLACEHOLDER.to_string()
        } else {
            text.to_string()
        }
    }

    fn flatten_tone(&self, text: &str) -> String {
        let without_emoji: String = text.chars().filter(|c| !STRIPPED_EMOJI.contains(c)).collect();
        match &self.exclamations {
            Some(re) => re.replace_all(&without_emoji, ".").into_owned(),
            None => without_emoji,
        }
    }

    fn strip_echoed_labels(&self, text: &str) -> String {
        let Some(re) = &self.echoed_label else {
            return text.to_string();
        };
        let mut rest = text.trim_start();
        while let Some(found) = re.find(rest) {
            if found.end() == 0 {
                break;
            }
            rest = rest[found.end()..].trim_start();
        }
        rest.to_string()
    }
}

fn cap_words(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > limit {
        words[..limit].join(" ")
    } else {
        text.to_string()
    }
}
