//! # termgpt Web Terminal Server (`srv`)
//!
//! File: cli/src/commands/srv/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! `termgpt srv` serves a browser terminal (black and green, with a persona
//! menu) plus the JSON API it talks to. Every browser tab gets its own
//! server-side conversation, so persona switches and transcripts in one tab
//! never leak into another.
//!
//! ## Architecture
//!
//! - `config`: command-line flags merged with the `[server]` config section
//! - `state`: the chat service, the open sessions and the rendered page
//! - `handlers`: the page and the session API
//! - `server_logic`: router, port fallback and graceful shutdown
//!
//! ## Examples
//!
//! ```bash
//! termgpt srv
//! termgpt srv --port 9000 --host 0.0.0.0
//! termgpt --persona tars srv --no-cors
//! ```
//!
use crate::core::config::{load_config, ConfigOverrides};
use crate::core::error::Result;
use crate::core::service::ChatService;
use tracing::info;

pub use config::SrvArgs;

pub mod config;
pub mod handlers;
pub mod server_logic;
pub mod state;

pub async fn handle_srv(args: SrvArgs, overrides: &ConfigOverrides) -> Result<()> {
    info!("Handling srv command with args: {:?}", args);

    let cfg = load_config(overrides)?;
    let server_config = config::ServerConfig::resolve(&args, &cfg.server)?;
    info!("Effective server config: {:?}", server_config);

    let service = ChatService::from_config(&cfg)?;
    server_logic::run_server(server_config, service).await
}
