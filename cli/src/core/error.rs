//! # termgpt Error Types
//!
//! File: cli/src/core/error.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module defines the application-level error types used throughout
//! termgpt. Failures that belong to a single conversation turn (backend
//! unreachable, empty reply, ...) are *not* here: they are returned as data
//! by the inference layer (`core::inference::InferenceFailure`) so the
//! dispatch surfaces can render them inline. `RelayError` covers everything
//! that stops a command from running at all.
//!
//! ## Architecture
//!
//! - `RelayError`: a `thiserror` enum for configuration, persona table,
//!   template and server errors
//! - `Result<T>`: a type alias for `anyhow::Result<T>` so command handlers can
//!   attach context freely
//!
//! ## Examples
//!
//! ```rust
//! if config.backend.model.trim().is_empty() {
//!     return Err(RelayError::Config("backend.model must not be empty".into()))?;
//! }
//!
//! let raw = fs::read_to_string(&path)
//!     .with_context(|| format!("Failed to read persona file: {}", path.display()))?;
//! ```
//!
use thiserror::Error;

/// Custom error type for the termgpt application.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persona table error: {0}")]
    PersonaTable(String),

    #[error("Failed to parse persona table: {source}")]
    PersonaToml {
        #[from]
        source: toml::de::Error,
    },

    #[error("Template rendering error: {source}")]
    Template {
        #[from]
        source: tera::Error,
    },

    #[error("Failed to build HTTP client: {source}")]
    HttpClient {
        #[from]
        source: reqwest::Error,
    },

    #[error("Server error: {0}")]
    Server(String),
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = RelayError::Config("backend.model must not be empty".to_string());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: backend.model must not be empty"
        );

        let table_err = RelayError::PersonaTable("duplicate persona id 'tars'".into());
        assert_eq!(
            table_err.to_string(),
            "Persona table error: duplicate persona id 'tars'"
        );

        let server_err = RelayError::Server("no free port".into());
        assert_eq!(server_err.to_string(), "Server error: no free port");
    }

    #[test]
    fn test_toml_error_converts() {
        let parse_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: RelayError = parse_err.into();
        assert!(err.to_string().starts_with("Failed to parse persona table:"));
    }
}
