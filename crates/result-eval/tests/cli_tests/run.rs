//! `run` subcommand tests.

use super::{fixture, result_eval};
use predicates::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

type JsonRun = Result<(i32, serde_json::Value), Box<dyn std::error::Error>>;

/// Run with `--format json` and return the exit code and parsed report.
fn run_json(args: &[&str], outputs: &[&str]) -> JsonRun {
    let mut cmd = result_eval();
    cmd.args(["run", "--format", "json", "--config"])
        .arg(fixture("results.yaml"))
        .args(args);
    for output in outputs {
        cmd.arg(fixture(output));
    }
    let output = cmd.output()?;
    let json = serde_json::from_slice(&output.stdout)?;
    Ok((output.status.code().unwrap_or(-1), json))
}

#[test]
fn test_run_table_output() {
    result_eval()
        .args(["run", "--config"])
        .arg(fixture("results.yaml"))
        .arg(fixture("fast.out"))
        .arg(fixture("slow.out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("processing results for 2 tests"))
        .stdout(predicate::str::contains("test fast ... ok"))
        .stdout(predicate::str::contains("test slow ... ok"))
        .stdout(predicate::str::contains("avg_speed"))
        .stdout(predicate::str::contains("test result: ok. 2 passed; 0 failed"));
}

#[test]
fn test_run_json_results() -> TestResult {
    let (code, json) = run_json(&[], &["fast.out", "slow.out"])?;
    assert_eq!(code, 0);

    let fast = &json["tests"][0];
    assert_eq!(fast["name"], "fast");
    assert_eq!(fast["results"]["speeds"], serde_json::json!(["12.5", "10.5", "14.0"]));
    assert_eq!(fast["results"]["errors"], false);
    assert_eq!(fast["results"]["iterations"], "3/3");
    assert_eq!(fast["results"]["fast"], true);
    assert_eq!(fast["results"]["result"], true);
    assert_eq!(fast["results"]["return_value"], 0);

    let slow = &json["tests"][1];
    assert_eq!(slow["results"]["avg_speed"], 3.0);
    assert_eq!(slow["results"]["errors"], true);
    assert_eq!(slow["results"]["result"], false);

    assert_eq!(json["summary"]["passed"], 2);
    assert!(json["timestamp"].is_string());
    Ok(())
}

#[test]
fn test_run_return_value_flag() -> TestResult {
    let (code, json) = run_json(&["--return-value", "3"], &["fast.out"])?;
    assert_eq!(code, 0);
    assert_eq!(json["tests"][0]["results"]["return_value"], 3);
    assert_eq!(json["tests"][0]["results"]["result"], false);
    Ok(())
}

#[test]
fn test_run_base_keys() -> TestResult {
    let (_, json) = run_json(
        &["--base", "sys_name=cluster1", "--base", "job_id=42"],
        &["fast.out"],
    )?;
    assert_eq!(json["tests"][0]["results"]["sys_name"], "cluster1");
    assert_eq!(json["tests"][0]["results"]["job_id"], 42);
    Ok(())
}

#[test]
fn test_run_failure_is_isolated() -> TestResult {
    let (code, json) = run_json(&[], &["empty.out", "fast.out"])?;
    assert_eq!(code, 1);

    let empty = &json["tests"][0];
    assert!(empty.get("results").is_none());
    assert!(
        empty["error"]
            .as_str()
            .is_some_and(|e| e.contains("error evaluating 'avg_speed'"))
    );
    assert_eq!(json["tests"][1]["results"]["result"], true);
    assert_eq!(json["summary"]["failed"], 1);
    Ok(())
}

#[test]
fn test_run_table_failures_section() {
    result_eval()
        .args(["run", "--config"])
        .arg(fixture("results.yaml"))
        .arg(fixture("empty.out"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("test empty ... FAILED"))
        .stdout(predicate::str::contains("---- empty ----"))
        .stdout(predicate::str::contains("avg(): empty list"))
        .stdout(predicate::str::contains("test result: FAILED. 0 passed; 1 failed"));
}

#[test]
fn test_run_cycle_reported() {
    result_eval()
        .args(["run", "--config"])
        .arg(fixture("cycle.yaml"))
        .arg(fixture("fast.out"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "evaluations have circular references: a, b",
        ));
}

#[test]
fn test_run_missing_output() {
    result_eval()
        .args(["run", "--config"])
        .arg(fixture("results.yaml"))
        .arg("/nonexistent/missing.out")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("cannot open test output"));
}

#[test]
fn test_run_verbose_lists_keys() {
    result_eval()
        .args(["run", "--verbose", "--config"])
        .arg(fixture("results.yaml"))
        .arg(fixture("fast.out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("    result = true"))
        .stdout(predicate::str::contains("    name = fast"))
        .stderr(predicate::str::contains("processing run"));
}
