//! CLI argument tests.

use super::{fixture, result_eval};
use predicates::prelude::*;

#[test]
fn test_arg_help() {
    result_eval()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Extract and evaluate results from test output",
        ));
}

#[test]
fn test_arg_version() {
    result_eval()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("result-eval"));
}

#[test]
fn test_arg_missing_subcommand() {
    result_eval().assert().failure();
}

#[test]
fn test_arg_run_requires_output() {
    result_eval()
        .args(["run", "--config"])
        .arg(fixture("results.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("OUTPUT"));
}

#[test]
fn test_arg_invalid_format() {
    result_eval()
        .args(["run", "--format", "invalid", "--config"])
        .arg(fixture("results.yaml"))
        .arg(fixture("fast.out"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn test_arg_invalid_base() {
    result_eval()
        .args(["run", "--base", "novalue", "--config"])
        .arg(fixture("results.yaml"))
        .arg(fixture("fast.out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn test_parsers_lists_regex_fields() {
    result_eval()
        .arg("parsers")
        .assert()
        .success()
        .stdout(predicate::str::contains("regex:"))
        .stdout(predicate::str::contains("match_type"))
        .stdout(predicate::str::contains("threshold"))
        .stdout(predicate::str::contains("expected"));
}
