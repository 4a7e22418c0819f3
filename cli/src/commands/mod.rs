//! # termgpt Command Modules
//!
//! File: cli/src/commands/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module aggregates the dispatch surfaces of the termgpt CLI. Each one
//! defines its own clap arguments and an async handler that receives them
//! together with the global configuration overrides.
//!
//! ## Command Groups
//!
//! - `chat`: interactive terminal REPL
//! - `ask`: one message, one reply
//! - `personas`: list the persona table
//! - `srv`: browser terminal and JSON session API
//!
//! All of them go through `core::service::ChatService`; none talks to the
//! backend directly.
//!

/// One-shot question. Prints the labelled reply and exits.
pub mod ask;
/// Interactive REPL with persona switching and text commands.
pub mod chat;
/// Persona table listing.
pub mod personas;
/// Web terminal server. Includes configuration, handlers, and server logic.
pub mod srv;
