//! # termgpt Page Templating
//!
//! File: cli/src/core/templating.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Renders the single HTML page served by `termgpt srv`: a black and green
//! terminal with a menu of personas. The page template is compiled into the
//! binary (`assets/index.html.tera`) and rendered with Tera once, at server
//! start, from the persona registry.
//!
//! The rendered page only carries static data (persona menu, default persona,
//! greetings). Everything else goes through the JSON session API.
//!
use crate::core::error::{RelayError, Result};
use crate::core::persona::{Persona, PersonaRegistry};
use anyhow::{anyhow, Context};
use serde::Serialize;
use tera::Tera;
use tracing::debug;

const PAGE_TEMPLATE_NAME: &str = "index.html";
const PAGE_TEMPLATE: &str = include_str!("../../assets/index.html.tera");

#[derive(Debug, Serialize)]
struct MenuEntry<'a> {
    id: &'a str,
    label: &'a str,
    menu_name: &'a str,
    greeting: &'a str,
    /// Lowercased command words (id, label, aliases) the page switches on.
    words: String,
}

/// Renders the terminal page for `registry`.
pub fn render_index_page(registry: &PersonaRegistry) -> Result<String> {
    render_page(PAGE_TEMPLATE, registry)
}

fn render_page(template: &str, registry: &PersonaRegistry) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template(PAGE_TEMPLATE_NAME, template)
        .map_err(|e| anyhow!(RelayError::Template { source: e }))
        .context("Failed to compile the terminal page template")?;

    let menu: Vec<MenuEntry> = registry
        .iter()
        .map(|p| MenuEntry {
            id: &p.id,
            label: &p.label,
            menu_name: &p.menu_name,
            greeting: p.greeting.as_deref().unwrap_or(""),
            words: command_words(p),
        })
        .collect();
    let default = registry.default_persona();

    let mut context = tera::Context::new();
    context.insert("app_name", env!("CARGO_PKG_NAME"));
    context.insert("version", env!("CARGO_PKG_VERSION"));
    context.insert("personas", &menu);
    context.insert("default_id", &default.id);
    context.insert("default_label", &default.label);

    let page = tera
        .render(PAGE_TEMPLATE_NAME, &context)
        .map_err(|e| anyhow!(RelayError::Template { source: e }))
        .context("Failed to render the terminal page")?;
    debug!("Rendered terminal page ({} bytes, {} personas)", page.len(), menu.len());
    Ok(page)
}

fn command_words(persona: &Persona) -> String {
    let mut words: Vec<String> = Vec::new();
    let candidates = std::iter::once(persona.id.as_str())
        .chain(std::iter::once(persona.label.as_str()))
        .chain(persona.aliases.iter().map(String::as_str));
    for word in candidates.map(|w| w.trim().to_lowercase()) {
        if !word.is_empty() && !words.contains(&word) {
            words.push(word);
        }
    }
    words.join(" ")
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PersonaRegistry {
        PersonaRegistry::builtin().unwrap()
    }

    #[test]
    fn test_index_page_lists_every_persona() {
        let page = render_index_page(&registry()).unwrap();
        for id in ["normal", "tars", "ultron", "c3po"] {
            assert!(page.contains(&format!("data-persona=\"{}\"", id)), "missing {}", id);
        }
        assert!(page.contains("data-default-persona=\"normal\""));
        assert!(page.contains("data-words=\"c3po c-3po\""));
        assert!(page.contains("/api/sessions"));
    }

    #[test]
    fn test_index_page_closes_its_session_and_trusts_filtered_replies() {
        let page = render_index_page(&registry()).unwrap();
        assert!(page.contains("\"pagehide\""));
        assert!(page.contains("method: \"DELETE\", keepalive: true"));
        // Reply bodies arrive unlabelled; the page only prefixes the label.
        assert!(page.contains("data.label + \": \" + data.reply;"));
        assert!(!page.contains("RegExp"));
    }

    #[test]
    fn test_index_page_escapes_persona_text() {
        let reg = PersonaRegistry::from_toml_str(
            r#"
            default = "x"
            [[persona]]
            id = "x"
            label = "X"
            menu_name = "<b>Bold</b>"
            system_prompt = "Be X."
            greeting = "Say \"hi\" & <wave>"
            "#,
        )
        .unwrap();
        let page = render_index_page(&reg).unwrap();
        assert!(!page.contains("<b>Bold</b>"));
        assert!(page.contains("&lt;b&gt;Bold&lt;&#x2F;b&gt;"));
        assert!(!page.contains("<wave>"));
    }

    #[test]
    fn test_broken_template_reports_template_error() {
        let err = render_page("{{ unclosed", &registry()).unwrap_err();
        assert!(err.to_string().contains("terminal page template"));
        assert!(err.downcast_ref::<RelayError>().is_some());
    }
}
