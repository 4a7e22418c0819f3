//! # termgpt Configuration System
//!
//! File: cli/src/core/config.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module loads, merges and validates termgpt's configuration: where the
//! inference backend lives, which model to ask for, how long to wait, which
//! persona table and default persona to use, and the defaults for the web
//! terminal server.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Command-line flags / `TERMGPT_*` environment variables (`ConfigOverrides`)
//! 2. Project-specific `.termgpt.toml` in the current directory or ancestors
//! 3. User-specific `<config dir>/termgpt/config.toml`
//! 4. Default values defined in the code
//!
//! `--config <FILE>` replaces sources 2 and 3 with a single explicit file.
//!
//! ## Examples
//!
//! ```toml
//! [backend]
//! url = "http://localhost:11434/api/chat"
//! model = "llama3.2"
//! timeout_secs = 120
//!
//! [personas]
//! default = "tars"
//! file = "~/.config/termgpt/personas.toml"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! enable_cors = true
//! session_idle_secs = 3600
//! ```
//!
//! ```rust
//! let cfg = config::load_config(&overrides)?;
//! let backend = OllamaClient::from_config(&cfg.backend)?;
//! ```
//!
use crate::core::error::{RelayError, Result};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use reqwest::Url;
use serde::Deserialize;
use std::net::IpAddr;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub personas: PersonasConfig,
    #[serde(default)]
    pub server: ServerDefaults,
}

/// Where and how to reach the inference server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Full URL of the chat endpoint.
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Model name sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Persona table selection.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PersonasConfig {
    /// Persona used for new conversations. Must exist in the table.
    pub default: Option<String>,
    /// Replacement persona table (can use ~). Will be expanded.
    pub file: Option<String>,
}

/// Defaults for `termgpt srv`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerDefaults {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
    /// Web sessions untouched for this long are dropped.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for ServerDefaults {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            enable_cors: default_enable_cors(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

/// Values given on the command line or through `TERMGPT_*` variables.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub backend_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub persona: Option<String>,
}

fn default_backend_url() -> String {
    "http://localhost:11434/api/chat".to_string()
}
fn default_model() -> String {
    "llama3.2".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    8000
}
fn default_enable_cors() -> bool {
    true
}
fn default_session_idle_secs() -> u64 {
    3600
}

const PROJECT_CONFIG_FILENAME: &str = ".termgpt.toml";

/// Loads the effective configuration from all sources.
pub fn load_config(overrides: &ConfigOverrides) -> Result<Config> {
    let mut config = match &overrides.config_file {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            load_config_from_path(path)?
        }
        None => {
            let user_config = load_user_config()?;
            let project_config = load_project_config()?;
            merge_configs(user_config.unwrap_or_default(), project_config)
        }
    };
    apply_overrides(&mut config, overrides);
    expand_config_paths(&mut config).context("Failed to expand paths in configuration")?;
    validate_config(&config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", config);
    Ok(config)
}

fn load_user_config() -> Result<Option<Config>> {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "christimahu", "termgpt") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config() -> Result<Option<Config>> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    if let Some(project_config_path) = find_project_config_path(&current_dir) {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file (.termgpt.toml) found in current directory or ancestors.");
        Ok(None)
    }
}

/// Walks up from `start` looking for `.termgpt.toml`, stopping at a `.git` directory.
fn find_project_config_path(start: &Path) -> Option<PathBuf> {
    let mut path: &Path = start;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

fn merge_configs(user: Config, project: Option<Config>) -> Config {
    let project_cfg = match project {
        Some(p) => p,
        None => return user,
    };
    let mut merged = Config::default();
    merged.backend.url = if project_cfg.backend.url != default_backend_url() {
        project_cfg.backend.url
    } else {
        user.backend.url
    };
    merged.backend.model = if project_cfg.backend.model != default_model() {
        project_cfg.backend.model
    } else {
        user.backend.model
    };
    merged.backend.timeout_secs = if project_cfg.backend.timeout_secs != default_timeout_secs() {
        project_cfg.backend.timeout_secs
    } else {
        user.backend.timeout_secs
    };
    merged.personas.default = project_cfg.personas.default.or(user.personas.default);
    merged.personas.file = project_cfg.personas.file.or(user.personas.file);
    merged.server.host = if project_cfg.server.host != default_server_host() {
        project_cfg.server.host
    } else {
        user.server.host
    };
    merged.server.port = if project_cfg.server.port != default_server_port() {
        project_cfg.server.port
    } else {
        user.server.port
    };
    merged.server.enable_cors = if project_cfg.server.enable_cors != default_enable_cors() {
        project_cfg.server.enable_cors
    } else {
        user.server.enable_cors
    };
    merged.server.session_idle_secs =
        if project_cfg.server.session_idle_secs != default_session_idle_secs() {
            project_cfg.server.session_idle_secs
        } else {
            user.server.session_idle_secs
        };
    merged
}

fn apply_overrides(config: &mut Config, overrides: &ConfigOverrides) {
    if let Some(url) = &overrides.backend_url {
        debug!("Backend URL overridden: {}", url);
        config.backend.url = url.clone();
    }
    if let Some(model) = &overrides.model {
        debug!("Model overridden: {}", model);
        config.backend.model = model.clone();
    }
    if let Some(timeout) = overrides.timeout_secs {
        config.backend.timeout_secs = timeout;
    }
    if let Some(persona) = &overrides.persona {
        config.personas.default = Some(persona.clone());
    }
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    if let Some(file) = &mut config.personas.file {
        *file = shellexpand::tilde(file).into_owned();
        debug!("Expanded persona file path: {}", file);
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    debug!("Validating final configuration...");
    let url = Url::parse(&config.backend.url).map_err(|e| {
        anyhow!(RelayError::Config(format!(
            "Invalid backend URL '{}': {}",
            config.backend.url, e
        )))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!(RelayError::Config(format!(
            "Backend URL '{}' must use http or https.",
            config.backend.url
        ))));
    }
    if config.backend.model.trim().is_empty() {
        return Err(anyhow!(RelayError::Config(
            "backend.model must not be empty.".to_string()
        )));
    }
    if config.backend.timeout_secs == 0 {
        return Err(anyhow!(RelayError::Config(
            "backend.timeout_secs must be greater than zero.".to_string()
        )));
    }
    if config.server.host.parse::<IpAddr>().is_err() {
        return Err(anyhow!(RelayError::Config(format!(
            "Invalid server host '{}'. Expected an IP address.",
            config.server.host
        ))));
    }
    if config.server.port == 0 {
        return Err(anyhow!(RelayError::Config(
            "server.port must be between 1 and 65535.".to_string()
        )));
    }
    if config.server.session_idle_secs == 0 {
        return Err(anyhow!(RelayError::Config(
            "server.session_idle_secs must be greater than zero.".to_string()
        )));
    }
    if let Some(file) = &config.personas.file {
        if !Path::new(file).is_file() {
            return Err(anyhow!(RelayError::Config(format!(
                "Configured persona file '{}' does not exist or is not a file.",
                file
            ))));
        }
    }
    debug!("Configuration validation successful.");
    Ok(())
}
