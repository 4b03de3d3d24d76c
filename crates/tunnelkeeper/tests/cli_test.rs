//! Integration tests for the `tunnelkeeper` binary.
//!
//! These cover argument parsing, local-only commands and error exit codes
//! without touching the keyring, the backend or a tunnel runner.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command with env isolation rooted at `home`.
fn tunnelkeeper_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tunnelkeeper");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("TUNNELKEEPER_CONFIG")
        .env_remove("TUNNELKEEPER_OUTPUT")
        .env_remove("TUNNELKEEPER_LOG_FILE")
        .env_remove("TUNNELKEEPER_API_URL")
        .env_remove("TUNNELKEEPER_RELAY_CACHE_PATH");
    cmd
}

const RELAYS: &str = r#"{
  "relays": {
    "relays": [
      {
        "hostname": "se-got-wg-001",
        "location": { "country": "Sweden", "country_code": "se", "city": "Gothenburg", "city_code": "got" },
        "active": true,
        "weight": 100,
        "ipv4_addr_in": "185.213.154.68",
        "public_key": "cHVibGljLWtleS1zZS1nb3Q="
      },
      {
        "hostname": "de-ber-wg-001",
        "location": { "country": "Germany", "country_code": "de", "city": "Berlin", "city_code": "ber" },
        "active": true,
        "weight": 50,
        "ipv4_addr_in": "193.32.248.66",
        "public_key": "cHVibGljLWtleS1kZS1iZXI="
      }
    ],
    "port_ranges": [{ "start": 51820, "end": 51820 }]
  },
  "updated_at": "2030-01-01T00:00:00Z"
}"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    tunnelkeeper_cmd(home.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    tunnelkeeper_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("account")
                .and(predicate::str::contains("connect"))
                .and(predicate::str::contains("relays"))
                .and(predicate::str::contains("constraints")),
        );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    tunnelkeeper_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tunnelkeeper"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    tunnelkeeper_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tunnelkeeper"));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    tunnelkeeper_cmd(home.path())
        .arg("teleport")
        .assert()
        .code(2);
}

#[test]
fn test_hostname_requires_city() {
    let home = tempfile::tempdir().unwrap();
    tunnelkeeper_cmd(home.path())
        .args(["constraints", "set", "--country", "se", "--hostname", "se-got-wg-001"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--city"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("custom.toml");
    tunnelkeeper_cmd(home.path())
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_show_defaults_as_json() {
    let home = tempfile::tempdir().unwrap();
    let output = tunnelkeeper_cmd(home.path())
        .args(["config", "show", "-o", "json", "--config"])
        .arg(home.path().join("config.toml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["key_rotation_interval"], "14d");
    assert_eq!(json["ipc_timeout_secs"], 5);
    assert_eq!(json["retry"], "default");
}

#[test]
fn test_config_set_persists() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("config.toml");

    tunnelkeeper_cmd(home.path())
        .args(["config", "set", "runner.command", "/opt/wg-runner", "--config"])
        .arg(&path)
        .assert()
        .success();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("/opt/wg-runner"), "{written}");

    tunnelkeeper_cmd(home.path())
        .args(["config", "show", "-o", "yaml", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("command: /opt/wg-runner"));
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    tunnelkeeper_cmd(home.path())
        .args(["config", "set", "colour", "red", "--config"])
        .arg(home.path().join("config.toml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown config key"));
}

#[test]
fn test_env_overrides_config_file() {
    let home = tempfile::tempdir().unwrap();
    tunnelkeeper_cmd(home.path())
        .env("TUNNELKEEPER_API_URL", "http://127.0.0.1:9/")
        .args(["config", "show", "-o", "json", "--config"])
        .arg(home.path().join("config.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("http://127.0.0.1:9/"));
}

// ── Relays ──────────────────────────────────────────────────────────

#[test]
fn test_relays_without_cache_is_not_found() {
    let home = tempfile::tempdir().unwrap();
    tunnelkeeper_cmd(home.path())
        .env(
            "TUNNELKEEPER_RELAY_CACHE_PATH",
            home.path().join("missing.json"),
        )
        .args(["relays", "--config"])
        .arg(home.path().join("config.toml"))
        .assert()
        .code(4)
        .stderr(predicate::str::contains("No relay list"));
}

#[test]
fn test_relays_filter_by_country() {
    let home = tempfile::tempdir().unwrap();
    let cache = home.path().join("relays.json");
    std::fs::write(&cache, RELAYS).unwrap();

    tunnelkeeper_cmd(home.path())
        .env("TUNNELKEEPER_RELAY_CACHE_PATH", &cache)
        .args(["relays", "--country", "SE", "-o", "plain", "--config"])
        .arg(home.path().join("config.toml"))
        .assert()
        .success()
        .stdout(predicate::eq("se-got-wg-001\n"));
}

#[test]
fn test_relays_table_lists_all() {
    let home = tempfile::tempdir().unwrap();
    let cache = home.path().join("relays.json");
    std::fs::write(&cache, RELAYS).unwrap();

    tunnelkeeper_cmd(home.path())
        .env("TUNNELKEEPER_RELAY_CACHE_PATH", &cache)
        .args(["relays", "--config"])
        .arg(home.path().join("config.toml"))
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Gothenburg (got)")
                .and(predicate::str::contains("de-ber-wg-001")),
        );
}
