//! CLI regression tests for the `lumen` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in flag
//! names, exit codes, and output formats — things the Rust API tests can't
//! catch.
//!
//! Run with: `cargo test -p lumen-test`
//! Requires the `lumen` binary to be built first (`cargo build -p lumen`).

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

/// Returns an assert_cmd Command wrapping the `lumen` binary.
fn lumen() -> Command {
    // cargo_bin is deprecated for custom build-dir setups; fine for standard workspace use.
    #[allow(deprecated)]
    Command::cargo_bin("lumen")
        .expect("lumen binary not found — run `cargo build -p lumen` first")
}

// ---------------------------------------------------------------------------
// lumen endpoint
// ---------------------------------------------------------------------------

#[test]
fn endpoint_prints_the_default_url() {
    lumen()
        .arg("endpoint")
        .assert()
        .success()
        .stdout(contains("wss://api.artik.cloud/v1.1/websocket?ack=true"));
}

#[test]
fn endpoint_no_ack_disables_the_flag() {
    lumen()
        .args(["endpoint", "--no-ack"])
        .assert()
        .success()
        .stdout(contains("?ack=false"));
}

#[test]
fn endpoint_respects_channel_flags() {
    lumen()
        .args([
            "endpoint",
            "--scheme",
            "ws",
            "--host",
            "localhost:9000",
            "--api-version",
            "v2",
            "--path",
            "live",
        ])
        .assert()
        .success()
        .stdout(contains("ws://localhost:9000/v2/live?ack=true"));
}

// ---------------------------------------------------------------------------
// lumen run
// ---------------------------------------------------------------------------

#[test]
fn run_with_missing_config_exits_one() {
    lumen()
        .args(["run", "--config", "this-file-does-not-exist.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("config"));
}

#[test]
fn run_with_invalid_config_exits_one() {
    let tmp = TempDir::new().expect("temp dir");
    let config = tmp.path().join("config.json");
    std::fs::write(&config, "{ not json").expect("write config");

    lumen()
        .args(["run", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn run_with_bad_log_format_exits_one() {
    let tmp = TempDir::new().expect("temp dir");
    let config = tmp.path().join("config.json");
    std::fs::write(&config, r#"{"deviceId":"d","deviceToken":"t"}"#).expect("write config");

    lumen()
        .args(["run", "--config"])
        .arg(&config)
        .args(["--log-format", "yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("log format"));
}

// ---------------------------------------------------------------------------
// usage errors
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    lumen()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("run"))
        .stdout(contains("endpoint"));
}

#[test]
fn no_subcommand_exits_two() {
    // clap returns exit code 2 for usage errors
    lumen().assert().failure().code(2);
}
