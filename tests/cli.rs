use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_config(dir: &Path) -> PathBuf {
    let config = dir.join("config.json");
    let data_dir = dir.join("data");
    let body = serde_json::json!({ "storage": { "data_dir": data_dir.display().to_string() } });
    std::fs::write(&config, body.to_string()).unwrap();
    config
}

fn reimburse(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reimburse").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("reimburse")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("attendance"))
        .stdout(predicate::str::contains("window"));
}

#[test]
fn test_window_january_covers_previous_december() {
    Command::cargo_bin("reimburse")
        .unwrap()
        .args(["window", "25_01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-12-01"))
        .stdout(predicate::str::contains("2024-12-31"));
}

#[test]
fn test_window_rejects_bad_month() {
    Command::cargo_bin("reimburse")
        .unwrap()
        .args(["window", "2025-05"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("yy_mm"));
}

#[test]
fn test_init_then_status() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    reimburse(&config)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized reimburse"));
    assert!(dir.path().join("data").join("reimburse.db").exists());

    reimburse(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Attendance days:  0"))
        .stdout(predicate::str::contains("Invoices:         0"));

    reimburse(&config)
        .args(["status", "--month", "25_05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-04-01"));
}

#[test]
fn test_status_without_database() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    reimburse(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database not found"));
}

#[test]
fn test_rules_set_persists_override() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    reimburse(&config)
        .args(["rules", "set", "--taxi-threshold", "10.5"])
        .assert()
        .success();
    reimburse(&config)
        .args(["rules", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("> 10.5"))
        .stdout(predicate::str::contains("¥18.00"));
}

#[test]
fn test_rules_set_rejects_inverted_thresholds() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    reimburse(&config)
        .args(["rules", "set", "--night-threshold", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("night threshold"));
}

#[test]
fn test_process_named_missing_month_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    reimburse(&config)
        .arg("process")
        .arg(dir.path())
        .args(["--month", "25_05", "--no-db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Month folder not found"));
}

#[test]
fn test_process_named_month_without_checkin_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    std::fs::create_dir(dir.path().join("25_05")).unwrap();
    reimburse(&config)
        .arg("process")
        .arg(dir.path())
        .args(["--month", "25_05", "--no-db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("未找到打卡文件"));
}

#[test]
fn test_process_all_skips_broken_months() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    std::fs::create_dir(dir.path().join("25_05")).unwrap();
    reimburse(&config)
        .arg("process")
        .arg(dir.path())
        .args(["--no-db", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No months processed."));
}

#[test]
fn test_receipt_rejects_unknown_type() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let pdf = dir.path().join("trip.pdf");
    std::fs::write(&pdf, b"not a pdf").unwrap();
    reimburse(&config)
        .arg("receipt")
        .arg(&pdf)
        .args(["--type", "bus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_malformed_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, "{ not json").unwrap();
    reimburse(&config)
        .args(["rules", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config error"));
}
