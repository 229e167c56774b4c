//! Smoke tests for the dcb CLI.
//!
//! These tests verify basic CLI functionality:
//! - `dcb --version` outputs version info
//! - `dcb --help` outputs help text
//! - `dcb mcp manifest` outputs valid JSON
//! - error paths exit nonzero with a JSON error object

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the dcb binary.
fn dcb() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dcb"))
}

#[test]
fn test_version_flag() {
    dcb().arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dcb"));
}

#[test]
fn test_help_flag() {
    dcb().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_mcp_manifest_is_json() {
    let output = dcb().args(["mcp", "manifest"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let tools = parsed["tools"].as_array().unwrap();
    assert!(tools.iter().any(|t| t["name"] == "dcb_compile_project"));
    assert!(tools.iter().any(|t| t["name"] == "dcb_extend_config"));
}

#[test]
fn test_compile_missing_project_errors_as_json() {
    let temp = tempfile::TempDir::new().unwrap();
    dcb().current_dir(temp.path())
        .args(["compile", "NoSuch.dproj"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_config_show_without_store_errors() {
    let temp = tempfile::TempDir::new().unwrap();
    dcb().current_dir(temp.path())
        .env_remove("DELPHI_CONFIG")
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_unknown_platform_rejected() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(temp.path().join("App.dpr"), "program App; begin end.").unwrap();
    dcb().current_dir(temp.path())
        .args(["compile", "App.dpr", "--platform", "OSX32"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown platform"));
}
