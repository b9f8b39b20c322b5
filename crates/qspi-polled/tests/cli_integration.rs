//! Integration tests for the qspi-polled CLI.

use env_logger as _;
use isf_flash as _;
use log as _;
use serde_json as _;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("qspi-polled")
}

fn create_temp_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn default_run_reports_success() {
    let output = Command::new(binary_path())
        .output()
        .expect("failed to run qspi-polled");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("QSPIPSU FLASH Polling Example Test"));
    assert!(stdout.contains("Successfully ran QSPIPSU FLASH Polling Example Test"));
}

#[test]
fn config_file_drives_the_run() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_temp_file(
        temp_dir.path(),
        "run.json",
        r#"{ "test_address": 131072, "page_size": 128, "page_count": 6,
             "read_command": "dual_op_fast_read" }"#,
    );

    let status = Command::new(binary_path())
        .args(["--config", config.to_str().unwrap(), "-v"])
        .status()
        .expect("failed to run qspi-polled");

    assert!(status.success());
}

#[test]
fn config_with_pages_larger_than_the_device_page_succeeds() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_temp_file(
        temp_dir.path(),
        "large.json",
        r#"{ "page_size": 1024, "page_count": 2 }"#,
    );

    let status = Command::new(binary_path())
        .args(["--config", config.to_str().unwrap()])
        .status()
        .expect("failed to run qspi-polled");

    assert!(status.success());
}

#[test]
fn stacked_run_with_overrides_succeeds() {
    let status = Command::new(binary_path())
        .args([
            "--stacked",
            "--address",
            "0x2000000",
            "--pages",
            "3",
            "--read",
            "read",
        ])
        .status()
        .expect("failed to run qspi-polled");

    assert!(status.success());
}

#[test]
fn corrupted_read_back_fails_with_exit_one() {
    let output = Command::new(binary_path())
        .args(["--corrupt", "17"])
        .output()
        .expect("failed to run qspi-polled");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("QSPIPSU FLASH Polling Example Test Failed"));
    assert!(stderr.contains("verification failed at offset 17"));
}

#[test]
fn unknown_config_field_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = create_temp_file(temp_dir.path(), "bad.json", r#"{ "page_sise": 256 }"#);

    let output = Command::new(binary_path())
        .args(["--config", config.to_str().unwrap()])
        .output()
        .expect("failed to run qspi-polled");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config"));
}

#[test]
fn missing_config_file_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("absent.json");

    let status = Command::new(binary_path())
        .args(["--config", missing.to_str().unwrap()])
        .status()
        .expect("failed to run qspi-polled");

    assert_eq!(status.code(), Some(1));
}

#[test]
fn unknown_option_prints_usage() {
    let output = Command::new(binary_path())
        .arg("--bogus")
        .output()
        .expect("failed to run qspi-polled");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown option: --bogus"));
    assert!(stderr.contains("Usage: qspi-polled"));
}

#[test]
fn help_exits_zero() {
    let output = Command::new(binary_path())
        .arg("--help")
        .output()
        .expect("failed to run qspi-polled");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage: qspi-polled"));
}
