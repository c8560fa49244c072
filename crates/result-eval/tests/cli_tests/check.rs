//! `check` subcommand tests.

use super::{fixture, result_eval};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_check_valid_config() {
    result_eval()
        .args(["check", "--config"])
        .arg(fixture("results.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: 3 result parsers, 3 evaluations"));
}

#[test]
fn test_check_syntax_error_is_diagnosed() {
    result_eval()
        .args(["check", "--config"])
        .arg(fixture("syntax_error.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error parsing evaluation 'ratio'"))
        .stderr(predicate::str::contains("Comparisons cannot be chained"))
        .stderr(predicate::str::contains("a < b < c\n      ^"));
}

#[test]
fn test_check_reserved_key() {
    result_eval()
        .args(["check", "--config"])
        .arg(fixture("reserved.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("'duration' is reserved"));
}

#[test]
fn test_check_invalid_range() {
    result_eval()
        .args(["check", "--config"])
        .arg(fixture("bad_range.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid result parser 'temps'"))
        .stderr(predicate::str::contains("invalid range: 10-5"));
}

#[test]
fn test_check_cycle_is_not_static() {
    // Cycles only show up once evaluation runs.
    result_eval()
        .args(["check", "--config"])
        .arg(fixture("cycle.yaml"))
        .assert()
        .success();
}

#[test]
fn test_check_missing_config() {
    result_eval()
        .args(["check", "--config", "/nonexistent/results.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_check_unknown_field() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("results.yaml");
    fs::write(&path, "parse:\n  regex:\n    a:\n      regex: x\n      matches: all\n")?;

    result_eval()
        .args(["check", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("YAML parse error"));
    Ok(())
}
