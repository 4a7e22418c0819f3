//! # termgpt CLI Main Integration Tests
//!
//! File: cli/tests/main_tests.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Top-level behavior of the `termgpt` binary: standard flags, subcommand
//! help, and configuration errors surfacing as `Error: ...` with exit code 1.
//!

mod common;
use common::*;
use predicates::prelude::*;

#[test]
fn test_main_help_flag() {
    termgpt_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("personas"))
        .stdout(predicate::str::contains("srv"));
}

#[test]
fn test_main_version_flag() {
    termgpt_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_srv_help_lists_flags() {
    termgpt_cmd()
        .args(["srv", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--no-cors"));
}

#[test]
fn test_unknown_subcommand_fails() {
    termgpt_cmd().arg("teleport").assert().failure();
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[backend]\ntimeout_secs = 0\n");
    termgpt_cmd()
        .arg("--config")
        .arg(&config)
        .arg("personas")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: Configuration validation failed"));
}

#[test]
fn test_unknown_config_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[backend]\nmodle = \"typo\"\n");
    termgpt_cmd()
        .arg("--config")
        .arg(&config)
        .arg("personas")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse TOML"));
}
