// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::manual_assert)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

use mockop::InputDigest;
use mockop_fixtures::helpers::{invocation, temp_dir, DirectoryBuilder};
use std::path::{Path, PathBuf};
use std::process::Command;

fn mockop_bin(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mockop"));
    cmd.current_dir(cwd)
        .env_remove("MOCK_OP_RESPONSE_DIRECTORY")
        .env_remove("MOCK_OP_STATE_DIR")
        .env_remove("RUST_LOG");
    cmd
}

fn sample_directory(dir: &Path) -> PathBuf {
    DirectoryBuilder::new(dir)
        .with(invocation(&["whoami"], b"me", 0, "whoami"))
        .with(invocation(&["item", "get", "Example Login"], b"{}", 0, "get-login"))
        .with(invocation(&["item", "delete", "-"], b"", 0, "delete").with_input(b"[1]".to_vec()))
        .build()
}

#[test]
fn list_prints_fingerprints_grouped_by_input_hash() {
    let dir = temp_dir("list");
    let index = sample_directory(&dir);
    let output = mockop_bin(&dir)
        .arg("list")
        .arg("--response-dir")
        .arg(&index)
        .output()
        .expect("failed to run mockop");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], format!("Directory path: {}", index.display()));
    assert_eq!(lines[1], "whoami");
    assert_eq!(lines[2], "item get 'Example Login'");
    assert_eq!(lines[3], format!("For input hash: {}:", InputDigest::of(b"[1]")));
    assert_eq!(lines[4], "item delete -");
}

#[test]
fn verbose_list_shows_blob_paths_and_status() {
    let dir = temp_dir("list-verbose");
    let index = sample_directory(&dir);
    let output = mockop_bin(&dir)
        .args(["list", "--verbose", "--response-dir"])
        .arg(&index)
        .output()
        .expect("failed to run mockop");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let blob = dir.join("responses").join("whoami").join("output");
    assert!(stdout.contains(&format!("\toutput: {}", blob.display())));
    assert!(stdout.contains("\terror output: (empty)"));
    assert!(stdout.contains("\texit status: 0"));
}

#[test]
fn json_list_reports_every_command() {
    let dir = temp_dir("list-json");
    let index = sample_directory(&dir);
    let output = mockop_bin(&dir)
        .args(["list", "--json", "--response-dir"])
        .arg(&index)
        .output()
        .expect("failed to run mockop");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let commands = report["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0]["fingerprint"], "whoami");
    assert!(commands[0]["input_digest"].is_null());
    assert_eq!(commands[2]["input_digest"], InputDigest::of(b"[1]").as_str());
    assert_eq!(commands[2]["meta"]["name"], "delete");
}

#[test]
fn list_uses_the_response_directory_variable() {
    let dir = temp_dir("list-env");
    let index = sample_directory(&dir);
    let output = mockop_bin(&dir)
        .env("MOCK_OP_RESPONSE_DIRECTORY", &index)
        .arg("list")
        .output()
        .expect("failed to run mockop");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("whoami"));
}

#[test]
fn list_of_a_missing_directory_fails_with_load_error() {
    let dir = temp_dir("list-missing");
    let output = mockop_bin(&dir)
        .args(["list", "--response-dir"])
        .arg(dir.join("nope.json"))
        .output()
        .expect("failed to run mockop");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error loading response directory:"));

    let output = mockop_bin(&dir)
        .args(["list", "--json", "--response-dir"])
        .arg(dir.join("nope.json"))
        .output()
        .expect("failed to run mockop");
    assert_eq!(output.status.code(), Some(2));
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["code"], "E_DIRECTORY_LOAD");
}

#[test]
fn completions_are_generated() {
    let dir = temp_dir("completions");
    let output = mockop_bin(&dir)
        .args(["completions", "bash"])
        .output()
        .expect("failed to run mockop");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("mockop"));
}
