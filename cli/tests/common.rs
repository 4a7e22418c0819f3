//! # termgpt CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Shared helpers for the integration tests in `cli/tests/`. Every test runs
//! the compiled `termgpt` binary against an explicit `--config` file so the
//! developer's own configuration and `TERMGPT_*` variables never leak in.
//!

// Not every test file uses every helper.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Backend address nothing listens on; requests fail fast with "connection refused".
pub const UNREACHABLE_BACKEND: &str = "http://127.0.0.1:9/api/chat";

/// Returns a `termgpt` command with the `TERMGPT_*` variables cleared.
pub fn termgpt_cmd() -> Command {
    let mut cmd = Command::cargo_bin("termgpt").expect("Failed to find termgpt binary for testing");
    for var in [
        "TERMGPT_BACKEND_URL",
        "TERMGPT_MODEL",
        "TERMGPT_PERSONA",
        "TERMGPT_TIMEOUT_SECS",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Writes `contents` as `config.toml` inside `dir` and returns its path.
pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, contents).expect("Failed to write test config");
    path
}

/// A temp dir holding a config that points at `UNREACHABLE_BACKEND`.
pub fn unreachable_config() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = write_config(
        dir.path(),
        &format!(
            "[backend]\nurl = \"{}\"\ntimeout_secs = 5\n",
            UNREACHABLE_BACKEND
        ),
    );
    (dir, path)
}
