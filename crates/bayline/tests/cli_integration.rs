//! CLI integration tests for the Bayline command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Argument parsing works as expected
//! - Offline-only commands produce the expected output
//! - Network commands degrade cleanly when the server is unreachable
//!
//! Note: These tests do not require a running server.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Address nothing listens on.
const DEAD_SERVER: &str = "http://127.0.0.1:1";

/// Get a command for the bayline binary, isolated to a temp config dir
/// with session persistence off.
fn bayline(dir: &TempDir) -> Command {
    std::fs::write(
        dir.path().join("config.toml"),
        "[session]\npersist = false\n",
    )
    .unwrap();
    let mut cmd = Command::cargo_bin("bayline").unwrap();
    cmd.env("BAYLINE_CONFIG_DIR", dir.path())
        .env_remove("BAYLINE_SERVER_URL")
        .env_remove("BAYLINE_PASSWORD");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("customers"))
        .stdout(predicate::str::contains("jobs"))
        .stdout(predicate::str::contains("obd2"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bayline"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    let dir = TempDir::new().unwrap();
    bayline(&dir).arg("frobnicate").assert().failure();
}

#[test]
fn test_jobs_status_requires_status_argument() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["jobs", "status", "12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("STATUS"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Offline commands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_obd2_parse_json() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["--json", "obd2", "parse", "stored: p0300 P0171, pending P0300"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"P0300\""))
        .stdout(predicate::str::contains("\"P0171\""));
}

#[test]
fn test_obd2_validate_rejects_bad_code() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["obd2", "validate", "P0420", "X1234"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("P0420"))
        .stdout(predicate::str::contains("X1234"));
}

#[test]
fn test_obd2_validate_accepts_codes() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["obd2", "validate", "P0420", "c1201"])
        .assert()
        .success();
}

#[test]
fn test_config_path_uses_config_dir() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_set_server_then_show() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["config", "set-server", "http://bay-2.local:5000"])
        .assert()
        .success();

    bayline_keep(&dir)
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://bay-2.local:5000"));
}

#[test]
fn test_config_rejects_bad_server() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["config", "set-server", "bay-2.local"])
        .assert()
        .failure();
}

#[test]
fn test_server_flag_overrides_config() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["--json", "--server", "http://10.0.0.9:5000", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://10.0.0.9:5000"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Unreachable server
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_status_reports_unreachable() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["--json", "--server", DEAD_SERVER, "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reachable\": false"));
}

#[test]
fn test_offline_write_is_queued_then_reported_undelivered() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["--server", DEAD_SERVER, "jobs", "status", "12", "completed"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("queued"))
        .stderr(predicate::str::contains("not delivered"));
}

#[test]
fn test_auth_status_signed_out() {
    let dir = TempDir::new().unwrap();
    bayline(&dir)
        .args(["--json", "auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"authenticated\": false"));
}

/// Like [`bayline`] but leaves an existing config file alone.
fn bayline_keep(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bayline").unwrap();
    cmd.env("BAYLINE_CONFIG_DIR", dir.path())
        .env_remove("BAYLINE_SERVER_URL");
    cmd
}
