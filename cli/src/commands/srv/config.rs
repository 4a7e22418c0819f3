//! # termgpt Server Configuration
//!
//! File: cli/src/commands/srv/config.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Resolves the settings of `termgpt srv` from its command-line flags and the
//! `[server]` section of the loaded configuration.
//!
//! Precedence: explicit flag, then `[server]` in the config files, then the
//! built-in defaults (`127.0.0.1:8000`, CORS on, sessions dropped after an
//! hour without use).
//!
use crate::core::config::ServerDefaults;
use crate::core::error::{RelayError, Result};
use anyhow::anyhow;
use clap::Parser;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// Arguments for `termgpt srv`.
#[derive(Parser, Debug, Default)]
pub struct SrvArgs {
    /// Port to listen on. The next free port is used if it is taken.
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Address to bind (e.g. 0.0.0.0 to serve the local network).
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Disable permissive CORS headers on the API.
    #[arg(long)]
    pub no_cors: bool,
}

/// Effective settings the server runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub enable_cors: bool,
    pub session_idle: Duration,
}

impl ServerConfig {
    pub fn resolve(args: &SrvArgs, defaults: &ServerDefaults) -> Result<Self> {
        let host = match args.host {
            Some(host) => host,
            None => defaults.host.parse().map_err(|e| {
                anyhow!(RelayError::Config(format!(
                    "Invalid server host '{}': {}",
                    defaults.host, e
                )))
            })?,
        };
        let config = Self {
            host,
            port: args.port.unwrap_or(defaults.port),
            enable_cors: !args.no_cors && defaults.enable_cors,
            session_idle: Duration::from_secs(defaults.session_idle_secs),
        };
        debug!("Resolved server settings: {:?}", config);
        Ok(config)
    }
}
