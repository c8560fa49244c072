//! Core library for result-eval.
//!
//! This crate turns raw test output into a namespace of named result values:
//! - Regex extraction with first/last/all, threshold and expected-range policies
//! - An expression language for derived values, with diagnosed syntax errors
//! - Dependency resolution between evaluations, with cycle detection
//! - YAML results config loading and validation
//! - Per-test processing with failure isolation
//! - Report generation

pub mod config;
pub mod evaluate;
pub mod expr;
pub mod matcher;
pub mod plugin;
pub mod reporter;
pub mod runner;
pub mod value;

pub use config::{ConfigError, ParseSection, ResultsConfig, ValidatedConfig, load_config};
pub use evaluate::{
    DEFAULT_RESULT_EXPR, EvaluationError, Evaluations, ParsedEvaluations, check_evaluations,
    evaluate_parsed, evaluate_results,
};
pub use expr::{EvalError, Expression, ParseError};
pub use matcher::{ExpectedSpec, MatchPolicy, MatchSpec, MatcherError, ValidatedMatcher};
pub use plugin::{ConfigField, RegexParser, ResultParser, TestContext, builtin_parsers};
pub use reporter::{ReportFormat, Reporter, ReporterConfig, RunReport, RunSummary, TestReport};
pub use runner::{
    ProcessError, TestInput, TestOutcome, process_all, process_file, process_results,
    process_str,
};
pub use value::{BASE_KEYS, RESULT_KEY, Results, Value, is_base_key};
