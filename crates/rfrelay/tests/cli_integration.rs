//! Integration tests for the `rfrelay` binary.
//!
//! These run the binary via `assert_cmd`. Commands that need hardware are
//! only exercised through `--help` or through argument errors that fail
//! before any USB access.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn cli() -> assert_cmd::Command {
    cargo_bin_cmd!("rfrelay")
}

#[test]
fn cli_help_succeeds() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rfrelay"));
}

#[test]
fn cli_version_prints_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ── config ──

#[test]
fn cli_config_json_produces_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let output = cli()
        .args(["--json", "config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value =
        serde_json::from_slice(&output).expect("config --json should produce valid JSON");
    assert!(json["settings"].is_object());
    assert_eq!(json["settings"]["serial"], "*");
    assert_eq!(json["settings"]["timeout_ms"], 1000);
    assert_eq!(json["config_file_exists"], false);
}

#[test]
fn cli_config_flags_override_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "serial = \"999\"\nmodel = \"SP8T\"\n").unwrap();
    let output = cli()
        .args(["--json", "config", "--sn", "032", "--config"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["settings"]["serial"], "032");
    assert_eq!(json["settings"]["model"], "SP8T");
    assert_eq!(json["config_file_exists"], true);
}

#[test]
fn cli_config_save_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub").join("config.toml");
    cli()
        .args(["config", "--save", "--timeout", "250", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("(loaded)"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# rfrelay configuration"));
    assert!(text.contains("timeout_ms = 250"));
}

#[test]
fn cli_config_reports_problems() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    cli()
        .args(["config", "--backend", "numato", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown backend"));
}

// ── --verbose flag ──

#[test]
fn cli_verbose_flag_accepted() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["-v", "config", "--config"])
        .arg(dir.path().join("config.toml"))
        .assert()
        .success();
}

#[test]
fn cli_double_verbose_accepted() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["-vv", "config", "--config"])
        .arg(dir.path().join("config.toml"))
        .assert()
        .success();
}

// ── errors before USB access ──

#[test]
fn cli_invalid_config_fails_with_error_prefix() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["read", "--timeout", "0", "--config"])
        .arg(dir.path().join("config.toml"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error: "))
        .stderr(predicate::str::contains("timeout_ms"));
}

#[test]
fn cli_set_rejects_wide_mask() {
    cli()
        .args(["set", "0x100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not fit"));
}

#[test]
fn cli_probe_rejects_non_byte_opcode() {
    cli()
        .args(["probe", "300"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a byte"));
}

// ── Subcommand help ──

#[test]
fn cli_list_help_succeeds() {
    cli()
        .args(["list", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("List"));
}

#[test]
fn cli_switch_help_succeeds() {
    cli()
        .args(["switch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECTOR"));
}

#[test]
fn cli_set_help_succeeds() {
    cli()
        .args(["set", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MASK"));
}

#[test]
fn cli_probe_help_succeeds() {
    cli()
        .args(["probe", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("opcode"));
}
