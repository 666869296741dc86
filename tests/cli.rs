use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn valid_alarm_json() -> &'static str {
    r#"
[
  { "id": 1, "hour": 7, "minute": 30, "weekdays": [], "enabled": true },
  { "id": 2, "hour": 9, "minute": 15, "weekdays": ["Mon", "Tue", "Wed", "Thu", "Fri"], "enabled": false }
]
"#
}

#[test]
fn list_prints_stored_alarms() {
    let dir = tempdir().expect("tempdir");
    let alarms = dir.path().join("alarms.json");
    fs::write(&alarms, valid_alarm_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--list")
        .arg("--alarms")
        .arg(alarms)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 alarm(s)"))
        .stdout(predicate::str::contains("[0] id=1 07:30 Once on"))
        .stdout(predicate::str::contains(
            "[1] id=2 09:15 Mon,Tue,Wed,Thu,Fri off",
        ));
}

#[test]
fn malformed_file_is_treated_as_empty() {
    let dir = tempdir().expect("tempdir");
    let alarms = dir.path().join("alarms.json");
    fs::write(&alarms, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--list")
        .arg("--alarms")
        .arg(alarms)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 alarm(s)"))
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn missing_file_is_treated_as_empty() {
    let dir = tempdir().expect("tempdir");
    let alarms = dir.path().join("absent.json");

    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--list")
        .arg("--alarms")
        .arg(alarms)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 alarm(s)"));
}

#[test]
fn zero_ring_duration_fails_with_clear_error() {
    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--list")
        .arg("--max-ring-secs")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "--max-ring-secs must be greater than zero",
        ));
}

#[test]
fn zero_debounce_window_fails_with_clear_error() {
    let mut cmd = cargo_bin_cmd!("alarmclock");
    cmd.arg("--list")
        .arg("--debounce-samples")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "--debounce-samples must be greater than zero",
        ));
}
