//! # termgpt Core
//!
//! File: cli/src/core/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module aggregates everything the dispatch surfaces (`chat`, `ask`,
//! `personas`, `srv`) share: configuration, errors, the persona registry, the
//! conversation model, the reply filter, the inference client and the chat
//! service that ties them together.
//!
//! ## Architecture
//!
//! - `config`: Configuration loading, merging, and validation
//! - `error`: Error types and the crate-wide `Result` alias
//! - `persona`: Persona definitions and the registry built from `personas.toml`
//! - `session`: Turns, roles and the per-chat `Conversation`
//! - `filter`: Normalization of raw model replies per persona
//! - `inference`: The `ChatBackend` seam and its Ollama implementation
//! - `service`: `ChatService`, the single entry point the surfaces call
//! - `templating`: Rendering of the browser terminal page
//!
//! ## Usage
//!
//! ```rust
//! use crate::core::config; // For loading configuration
//! use crate::core::service::{ChatService, SendOutcome}; // For running turns
//! ```
//!
pub mod config;
pub mod error;
pub mod filter;
pub mod inference;
pub mod persona;
pub mod service;
pub mod session;
pub mod templating;
