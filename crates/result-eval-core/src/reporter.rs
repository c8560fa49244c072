//! Run output with cargo test-like formatting, plus the JSON report schema.

use crate::runner::TestOutcome;
use crate::value::Results;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::time::Duration;

/// Output format for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown format: {s}. Valid formats: table, json")),
        }
    }
}

/// Counts of processed tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    #[must_use]
    pub fn from_outcomes(outcomes: &[TestOutcome]) -> Self {
        let passed = outcomes.iter().filter(|o| o.is_ok()).count();
        Self {
            total: outcomes.len(),
            passed,
            failed: outcomes.len() - passed,
        }
    }
}

/// One test in a JSON report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Results>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&TestOutcome> for TestReport {
    fn from(outcome: &TestOutcome) -> Self {
        let (results, error) = match &outcome.result {
            Ok(results) => (Some(results.clone()), None),
            Err(e) => (None, Some(e.clone())),
        };
        Self {
            name: outcome.ctx.name.clone(),
            id: outcome.ctx.id.clone(),
            results,
            error,
        }
    }
}

/// A full run, as printed by `--format json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// ISO 8601 timestamp of the run.
    pub timestamp: String,
    pub tests: Vec<TestReport>,
    pub summary: RunSummary,
}

impl RunReport {
    #[must_use]
    pub fn new(timestamp: &str, outcomes: &[TestOutcome]) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            tests: outcomes.iter().map(TestReport::from).collect(),
            summary: RunSummary::from_outcomes(outcomes),
        }
    }
}

/// Reporter configuration.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Show verbose output (every result key).
    pub verbose: bool,
    /// Use colors in output.
    pub color: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            color: true,
        }
    }
}

const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";

/// Reporter with cargo test-like output.
#[derive(Clone)]
pub struct Reporter {
    config: ReporterConfig,
}

impl Reporter {
    #[must_use]
    pub const fn new(config: ReporterConfig) -> Self {
        Self { config }
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.config.color {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn status(&self, ok: bool) -> String {
        if ok {
            self.paint("ok", GREEN)
        } else {
            self.paint("FAILED", RED)
        }
    }

    /// Print the start of a run.
    pub fn run_start(&self, test_count: usize) {
        println!();
        println!("processing results for {test_count} tests");
    }

    /// Print a test result line.
    pub fn test_result(&self, outcome: &TestOutcome) {
        println!("test {} ... {}", outcome.ctx, self.status(outcome.is_ok()));

        if self.config.verbose {
            if let Ok(results) = &outcome.result {
                for (key, value) in results.iter() {
                    println!("    {key} = {value}");
                }
            }
        }
    }

    /// Print failures section.
    pub fn failures(&self, outcomes: &[TestOutcome]) {
        if outcomes.iter().all(TestOutcome::is_ok) {
            return;
        }

        println!();
        println!("failures:");
        println!();

        for outcome in outcomes {
            if let Err(error) = &outcome.result {
                println!("---- {} ----", outcome.ctx);
                for line in error.lines() {
                    println!("    {line}");
                }
                println!();
            }
        }
    }

    /// Print the final summary.
    pub fn summary(&self, summary: &RunSummary, duration: Duration) {
        println!();
        println!(
            "test result: {}. {} passed; {} failed; finished in {:.1}s",
            self.status(summary.failed == 0),
            summary.passed,
            summary.failed,
            duration.as_secs_f64()
        );
    }

    /// Print a warning message.
    pub fn warn(&self, message: &str) {
        eprintln!("{}: {message}", self.paint("warning", YELLOW));
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        eprintln!("{}: {message}", self.paint("error", RED));
    }

    /// Flush stdout.
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::TestContext;
    use crate::value::Value;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn outcomes() -> Vec<TestOutcome> {
        let results: Results = [("result", Value::Bool(true)), ("speed", Value::from("3"))]
            .into_iter()
            .collect();
        vec![
            TestOutcome {
                ctx: TestContext::new("a"),
                result: Ok(results),
            },
            TestOutcome {
                ctx: TestContext::new("b").with_id("2"),
                result: Err("evaluations have circular references: x, y".to_string()),
            },
        ]
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("table".parse::<ReportFormat>(), Ok(ReportFormat::Table));
        assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("yaml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary::from_outcomes(&outcomes());
        assert_eq!(
            summary,
            RunSummary {
                total: 2,
                passed: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_run_report_json() -> TestResult {
        let report = RunReport::new("2026-01-30T06:00:00.000Z", &outcomes());
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&report)?)?;

        assert_eq!(json["timestamp"], "2026-01-30T06:00:00.000Z");
        assert_eq!(json["tests"][0]["name"], "a");
        assert_eq!(json["tests"][0]["results"]["result"], true);
        assert_eq!(json["tests"][0]["results"]["speed"], "3");
        assert!(json["tests"][0].get("error").is_none());
        assert_eq!(json["tests"][1]["id"], "2");
        assert!(json["tests"][1].get("results").is_none());
        assert_eq!(json["summary"]["failed"], 1);
        Ok(())
    }

    #[test]
    fn test_paint_without_color() {
        let reporter = Reporter::new(ReporterConfig {
            verbose: false,
            color: false,
        });
        assert_eq!(reporter.status(true), "ok");
        assert_eq!(reporter.status(false), "FAILED");

        let colored = Reporter::new(ReporterConfig::default());
        assert_eq!(colored.status(true), "\x1b[32mok\x1b[0m");
    }
}
