use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_names_the_run_command() {
    Command::cargo_bin("keel")
        .expect("bin")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"));
}

#[test]
fn run_requires_config_flag() {
    Command::cargo_bin("keel")
        .expect("bin")
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn missing_config_file_fails_with_path() {
    Command::cargo_bin("keel")
        .expect("bin")
        .args(["run", "--config", "/nonexistent/apps.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/apps.json"));
}

#[test]
fn malformed_config_file_fails_to_parse() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(b"{ not json").expect("write");

    Command::cargo_bin("keel")
        .expect("bin")
        .args(["run", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsing config file"));
}

#[test]
fn empty_application_list_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(br#"{ "applications": [] }"#).expect("write");

    Command::cargo_bin("keel")
        .expect("bin")
        .args(["run", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no applications"));
}
