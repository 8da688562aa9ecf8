//! CLI smoke tests for the `dx` binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `dx` command isolated in `temp`: config, data dirs and log file all live there
fn dx(temp: &Path) -> Command {
    let config = temp.join("discovery.yml");
    fs::write(
        &config,
        format!(
            "storage:\n  cache-dir: {root}/profiles\n  sessions-dir: {root}/sessions\n  events-dir: {root}/rounds\n",
            root = temp.display()
        ),
    )
    .unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dx"));
    cmd.current_dir(temp)
        .env("HOME", temp)
        .env("XDG_DATA_HOME", temp.join("data"))
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .arg("--config")
        .arg(&config);
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    Command::new(env!("CARGO_BIN_EXE_dx"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("round"))
        .stdout(predicate::str::contains("session"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn test_cache_show_without_profile() {
    let temp = TempDir::new().unwrap();
    dx(temp.path())
        .args(["cache", "show", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached profile for demo"));
}

#[test]
fn test_cache_show_and_clear_existing_profile() {
    let temp = TempDir::new().unwrap();
    let profiles = temp.path().join("profiles");
    fs::create_dir_all(&profiles).unwrap();
    fs::write(
        profiles.join("demo.json"),
        r#"{"version":1,"updatedAt":"2026-01-05T10:00:00Z","summary":"Django app","stackHints":["python","django"],"signals":[],"confidence":75}"#,
    )
    .unwrap();

    dx(temp.path())
        .args(["cache", "show", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stackHints\""))
        .stdout(predicate::str::contains("django"));

    dx(temp.path())
        .args(["cache", "clear", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared cached profile"));

    assert!(!profiles.join("demo.json").exists());
}

#[test]
fn test_session_show_unknown_fails() {
    let temp = TempDir::new().unwrap();
    dx(temp.path())
        .args(["session", "show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found"));
}

#[test]
fn test_round_rejects_malformed_answer() {
    let temp = TempDir::new().unwrap();
    dx(temp.path())
        .args(["round", "--goal", "Build a CRM", "--answer", "no-separator"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("QUESTION_ID=TEXT"));
}

#[test]
fn test_round_requires_api_key() {
    let temp = TempDir::new().unwrap();
    dx(temp.path())
        .env_remove("ANTHROPIC_API_KEY")
        .args(["round", "--goal", "Build a CRM"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}
