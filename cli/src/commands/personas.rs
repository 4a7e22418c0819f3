//! # termgpt Persona Listing (`personas`)
//!
//! File: cli/src/commands/personas.rs
//! Author: Christi Mahu
//!
//! Prints the personas of the effective persona table (built-in or the
//! configured `[personas] file`), marking the default one.
//!
use crate::core::config::{self, ConfigOverrides};
use crate::core::error::Result;
use crate::core::persona::PersonaRegistry;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct PersonasArgs {
    /// Also print each persona's system prompt.
    #[arg(long)]
    pub prompts: bool,
}

pub async fn handle_personas(args: PersonasArgs, overrides: &ConfigOverrides) -> Result<()> {
    let cfg = config::load_config(overrides)?;
    let registry = PersonaRegistry::load(&cfg.personas)?;
    let mut stdout = std::io::stdout();
    write_table(&registry, args.prompts, &mut stdout)
}

fn write_table(registry: &PersonaRegistry, prompts: bool, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "  {:<10} {:<8} {:<12} {:<8} {}",
        "ID", "LABEL", "TONE", "WORDS", "ALIASES"
    )?;
    for persona in registry.iter() {
        let marker = if persona.id == registry.default_id() { "*" } else { " " };
        let tone = if persona.rules.flatten_tone { "flattened" } else { "as-is" };
        let words = persona
            .rules
            .max_words
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{} {:<10} {:<8} {:<12} {:<8} {}",
            marker,
            persona.id,
            persona.label,
            tone,
            words,
            persona.aliases.join(", ")
        )?;
        if prompts {
            for line in persona.system_prompt.lines() {
                writeln!(out, "      {}", line)?;
            }
        }
    }
    Ok(())
}
