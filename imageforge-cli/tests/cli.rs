use assert_cmd::Command;
use predicates::prelude::*;

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("build.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn build_succeeds_with_exit_zero() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        r#"
        [[stage]]
        name = "noop"
        program = "sh"
        args = ["-c", "true"]
        "#,
    );

    Command::cargo_bin("imageforge")
        .unwrap()
        .args(["build", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("succeeded"));
}

#[test]
fn build_terminal_failure_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        r#"
        [[stage]]
        name = "broken"
        program = "sh"
        args = ["-c", "echo 'file is locked' >&2; exit 1"]

        [stage.retry]
        max_attempts = 2
        base_delay_ms = 1
        "#,
    );

    Command::cargo_bin("imageforge")
        .unwrap()
        .args(["build", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("likely cause: lock contention"));
}

#[test]
fn build_invalid_config_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "not toml at all [");

    Command::cargo_bin("imageforge")
        .unwrap()
        .args(["build", "--config"])
        .arg(&config)
        .assert()
        .code(2);
}

#[test]
fn build_writes_report_for_explain() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.json");
    let config = write_config(
        &dir,
        r#"
        [[stage]]
        name = "noop"
        program = "sh"
        args = ["-c", "true"]
        "#,
    );

    Command::cargo_bin("imageforge")
        .unwrap()
        .args(["build", "--config"])
        .arg(&config)
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    Command::cargo_bin("imageforge")
        .unwrap()
        .arg("explain")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("succeeded"));
}

#[test]
fn validate_reports_stages() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        r#"
        [[stage]]
        name = "create-media"
        program = "copype"
        "#,
    );

    Command::cargo_bin("imageforge")
        .unwrap()
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("create-media"));
}

#[test]
fn validate_rejects_empty_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "");

    Command::cargo_bin("imageforge")
        .unwrap()
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no stages"));
}
