//! Result parser plugins.
//!
//! A result parser turns a test's output into a single value. Parsers are
//! validated once per configuration and then run once per test.

use crate::matcher::{MatchSpec, MatcherError, ValidatedMatcher};
use crate::value::Value;
use std::io::BufRead;
use tracing::debug;

/// Identifies the test whose output is being parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestContext {
    pub name: String,
    pub id: Option<String>,
}

impl TestContext {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

impl std::fmt::Display for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}#{id}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A configuration field accepted by a parser, for help output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigField {
    pub name: &'static str,
    pub required: bool,
    pub help: &'static str,
}

/// Trait for turning raw test output into a result value.
pub trait ResultParser {
    /// Name used for this parser in configuration files.
    fn name(&self) -> &'static str;

    /// One-line description of what the parser does.
    fn help(&self) -> &'static str;

    /// Fields accepted in this parser's configuration.
    fn config_fields(&self) -> &'static [ConfigField];

    /// Validate a parser configuration ahead of any test run.
    ///
    /// # Errors
    /// Returns a `MatcherError` describing the invalid setting.
    fn check_args(&self, spec: &MatchSpec) -> Result<ValidatedMatcher, MatcherError>;

    /// Parse one test's output.
    ///
    /// # Errors
    /// Returns a `MatcherError` if the output cannot be read.
    fn parse(
        &self,
        ctx: &TestContext,
        reader: &mut dyn BufRead,
        matcher: &ValidatedMatcher,
    ) -> Result<Value, MatcherError>;
}

const REGEX_FIELDS: &[ConfigField] = &[
    ConfigField {
        name: "regex",
        required: true,
        help: "Regular expression searched for on each line of the output. \
               Only the first match on a line is kept.",
    },
    ConfigField {
        name: "match_type",
        required: false,
        help: "Which matches to return: 'first' (default), 'last' or 'all'.",
    },
    ConfigField {
        name: "threshold",
        required: false,
        help: "If set, return true when at least this many lines matched.",
    },
    ConfigField {
        name: "expected",
        required: false,
        help: "Expected values ('10') or inclusive ranges ('1-5', '-3--1'). \
               Returns one boolean per match.",
    },
];

/// Finds regex matches in the output, one per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexParser;

impl ResultParser for RegexParser {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn help(&self) -> &'static str {
        "Find matches to the given regex in the test output. The matched string \
         or strings are returned as the result."
    }

    fn config_fields(&self) -> &'static [ConfigField] {
        REGEX_FIELDS
    }

    fn check_args(&self, spec: &MatchSpec) -> Result<ValidatedMatcher, MatcherError> {
        spec.validate()
    }

    fn parse(
        &self,
        ctx: &TestContext,
        reader: &mut dyn BufRead,
        matcher: &ValidatedMatcher,
    ) -> Result<Value, MatcherError> {
        let matches = matcher.collect_matches(reader)?;
        debug!(test = %ctx, pattern = matcher.pattern(), count = matches.len(), "regex matches");
        Ok(matcher.reduce(matches))
    }
}

/// All built-in result parsers.
#[must_use]
pub fn builtin_parsers() -> Vec<Box<dyn ResultParser>> {
    vec![Box::new(RegexParser)]
}
