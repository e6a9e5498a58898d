//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, each subcommand
//! responds to `--help`, and the exit codes split configuration errors (2)
//! from runtime errors (1).

#![allow(deprecated)] // cargo_bin deprecation — replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `showrun` binary.
fn showrun() -> Command {
    Command::cargo_bin("showrun").expect("binary 'showrun' should be built")
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    showrun()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: showrun"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn short_help_flag_shows_usage() {
    showrun()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: showrun"));
}

#[test]
fn version_flag_shows_semver() {
    showrun()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^showrun \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    showrun()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: showrun"));
}

#[test]
fn invalid_subcommand_fails() {
    showrun()
        .arg("this-is-not-a-real-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn generate_help() {
    showrun()
        .args(["generate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generate one video"))
        .stdout(predicate::str::contains("--topic"))
        .stdout(predicate::str::contains("--topic-file"))
        .stdout(predicate::str::contains("--set"))
        .stdout(predicate::str::contains("PATH=VALUE"));
}

#[test]
fn serve_help() {
    showrun()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("HTTP server"))
        .stdout(predicate::str::contains("--set"));
}

#[test]
fn config_help() {
    showrun()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("effective configuration"));
}

// ─── Subcommand argument validation ──────────────────────────────────────────

#[test]
fn generate_requires_a_topic_source() {
    showrun()
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--topic"));
}

#[test]
fn generate_rejects_both_topic_sources() {
    showrun()
        .args(["generate", "--topic", "x", "--topic-file", "t.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn generate_empty_topic_is_a_runtime_error() {
    showrun()
        .args(["generate", "--topic", "  "])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("topic is empty"));
}

#[test]
fn generate_missing_topic_file_is_a_runtime_error() {
    showrun()
        .args(["generate", "--topic-file", "/definitely/not/here.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("read topic file"));
}

// ─── Effective configuration ─────────────────────────────────────────────────

#[test]
fn config_prints_effective_json() {
    showrun()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dark_tech\""))
        .stdout(predicate::str::contains("\"persona\""))
        .stdout(predicate::str::contains("\"provider\""));
}

#[test]
fn config_applies_set_overrides() {
    showrun()
        .args(["config", "--set", "script.target_minutes=10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"target_minutes\": 10"));
}

// ─── Exit code 2: configuration errors ───────────────────────────────────────

#[test]
fn unknown_override_path_exits_2() {
    showrun()
        .args(["config", "--set", "video.stylo=minimal_white"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("configuration error"))
        .stderr(predicate::str::contains("video.stylo"));
}

#[test]
fn wrong_value_kind_exits_2() {
    showrun()
        .args(["config", "--set", "script.target_minutes=purple"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("script.target_minutes"));
}

#[test]
fn malformed_set_argument_exits_2() {
    showrun()
        .args(["config", "--set", "video.style"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("PATH=VALUE"));
}

#[test]
fn missing_config_file_exits_2() {
    showrun()
        .args(["--config", "/definitely/not/here.json", "config"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("configuration error"));
}

// ─── Exit code 1: runtime errors ─────────────────────────────────────────────

#[test]
fn generate_without_credentials_exits_1() {
    showrun()
        .env_remove("GOOGLE_SEARCH_API_KEY")
        .env_remove("GOOGLE_SEARCH_CX")
        .args(["generate", "--topic", "Claude 4 just launched"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Generating video for: Claude 4 just launched"));
}
