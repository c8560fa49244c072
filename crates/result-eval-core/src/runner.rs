//! Result processing for test runs.
//!
//! Each test starts from its base keys, gets every configured matcher run
//! over its output, then has its evaluations resolved. Tests in a batch are
//! processed independently: one failing test never stops the others.

use crate::config::ValidatedConfig;
use crate::evaluate::{EvaluationError, evaluate_parsed};
use crate::matcher::MatcherError;
use crate::plugin::{RegexParser, ResultParser, TestContext};
use crate::value::Results;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while processing one test's results.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("cannot open test output '{}': {source}", .path.display())]
    OutputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read test output: {0}")]
    Output(#[from] io::Error),
    #[error("result parser '{key}' failed: {source}")]
    Matcher {
        key: String,
        #[source]
        source: MatcherError,
    },
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Run every matcher, then every evaluation, for one test.
///
/// `open` is called once per matcher and must return a fresh reader
/// positioned at the start of the output.
///
/// # Errors
/// Returns an error if the output cannot be opened, a matcher fails to read
/// it, or evaluation fails.
pub fn process_results<F, R>(
    ctx: &TestContext,
    base: Results,
    config: &ValidatedConfig,
    mut open: F,
) -> Result<Results, ProcessError>
where
    F: FnMut() -> io::Result<R>,
    R: BufRead,
{
    let parser = RegexParser;
    let mut results = base;

    for (key, matcher) in &config.matchers {
        let mut reader = open()?;
        let value = parser
            .parse(ctx, &mut reader, matcher)
            .map_err(|source| ProcessError::Matcher {
                key: key.clone(),
                source,
            })?;
        debug!(test = %ctx, key = key.as_str(), value = %value, "extracted");
        results.insert(key.as_str(), value);
    }

    evaluate_parsed(&mut results, &config.evaluations)?;
    Ok(results)
}

/// Process a test whose output is stored in a file.
///
/// # Errors
/// Returns an error if the file cannot be opened or processing fails.
pub fn process_file(
    ctx: &TestContext,
    base: Results,
    config: &ValidatedConfig,
    path: &Path,
) -> Result<Results, ProcessError> {
    let open = || File::open(path).map(BufReader::new);
    // Fail early with the path in the message, even with no matchers.
    open().map_err(|source| ProcessError::OutputFile {
        path: path.to_path_buf(),
        source,
    })?;
    process_results(ctx, base, config, open)
}

/// Process a test whose output is already in memory.
///
/// # Errors
/// Returns an error if processing fails.
pub fn process_str(
    ctx: &TestContext,
    base: Results,
    config: &ValidatedConfig,
    output: &str,
) -> Result<Results, ProcessError> {
    process_results(ctx, base, config, || Ok(output.as_bytes()))
}

/// One test to process in a batch.
#[derive(Debug, Clone)]
pub struct TestInput {
    pub ctx: TestContext,
    pub base: Results,
    pub output: PathBuf,
}

/// The outcome of processing one test in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub ctx: TestContext,
    /// The final namespace, or the message of the error that stopped
    /// processing.
    pub result: Result<Results, String>,
}

impl TestOutcome {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Process every test in `tests`, isolating failures.
#[must_use]
pub fn process_all(config: &ValidatedConfig, tests: &[TestInput]) -> Vec<TestOutcome> {
    tests
        .iter()
        .map(|test| {
            let result = process_file(&test.ctx, test.base.clone(), config, &test.output)
                .map_err(|e| {
                    warn!(test = %test.ctx, error = %e, "result processing failed");
                    e.to_string()
                });
            TestOutcome {
                ctx: test.ctx.clone(),
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResultsConfig;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const CONFIG: &str = r"
parse:
  regex:
    speeds:
      regex: '[0-9.]+'
      match_type: all
    passed:
      regex: 'PASS'
      threshold: 2
evaluate:
  avg_speed: 'avg(speeds)'
  result: 'passed and avg_speed > 10'
";

    fn config() -> Result<ValidatedConfig, Box<dyn std::error::Error>> {
        Ok(ResultsConfig::from_yaml(CONFIG)?.validate()?)
    }

    fn base(return_value: i64) -> Results {
        let mut results = Results::new();
        results.insert("return_value", return_value);
        results
    }

    #[test]
    fn test_process_str() -> TestResult {
        let output = "copy 12.5 MB/s PASS\ncopy 7.5 MB/s\nread 16 MB/s PASS\n";
        let results = process_str(&TestContext::new("io"), base(0), &config()?, output)?;

        let expected: Results = [
            ("avg_speed", Value::Float(12.0)),
            ("passed", Value::Bool(true)),
            ("result", Value::Bool(true)),
            ("return_value", Value::Int(0)),
            ("speeds", Value::from(vec!["12.5", "7.5", "16"])),
        ]
        .into_iter()
        .collect();
        assert_eq!(results, expected);
        Ok(())
    }

    #[test]
    fn test_process_str_runtime_error() -> TestResult {
        let result = process_str(&TestContext::new("io"), base(0), &config()?, "PASS\nPASS\n");
        assert!(matches!(
            result,
            Err(ProcessError::Evaluation(EvaluationError::Runtime { ref key, .. })) if key == "avg_speed"
        ));
        Ok(())
    }

    #[test]
    fn test_process_without_config_uses_default_result() -> TestResult {
        let config = ResultsConfig::default().validate()?;
        let results = process_str(&TestContext::new("t"), base(1), &config, "")?;
        assert_eq!(results.get("result"), Some(&Value::Bool(false)));
        Ok(())
    }

    #[test]
    fn test_process_file_missing() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("missing.out");
        let result = process_file(&TestContext::new("t"), base(0), &config()?, &path);
        assert!(matches!(result, Err(ProcessError::OutputFile { .. })));
        Ok(())
    }

    #[test]
    fn test_process_all_isolates_failures() -> TestResult {
        let dir = TempDir::new()?;
        let good = dir.path().join("good.out");
        let bad = dir.path().join("bad.out");
        std::fs::write(&good, "20 MB/s PASS\n30 MB/s PASS\n")?;
        std::fs::write(&bad, "no numbers here\n")?;

        let tests = vec![
            TestInput {
                ctx: TestContext::new("bad"),
                base: base(0),
                output: bad,
            },
            TestInput {
                ctx: TestContext::new("missing"),
                base: base(0),
                output: dir.path().join("missing.out"),
            },
            TestInput {
                ctx: TestContext::new("good"),
                base: base(0),
                output: good,
            },
        ];

        let outcomes = process_all(&config()?, &tests);
        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].is_ok());
        assert!(!outcomes[1].is_ok());
        assert!(outcomes[2].is_ok());

        let good = outcomes[2].result.as_ref().map_err(Clone::clone)?;
        assert_eq!(good.get("avg_speed"), Some(&Value::Float(25.0)));
        assert_eq!(good.get("result"), Some(&Value::Bool(true)));
        Ok(())
    }
}
