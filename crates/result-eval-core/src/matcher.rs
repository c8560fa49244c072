//! Regex extraction matcher.
//!
//! A [`MatchSpec`] comes straight from configuration. [`MatchSpec::validate`]
//! compiles it once into a [`ValidatedMatcher`], which scans a line-oriented
//! stream and reduces the per-line matches to a single [`Value`].

use crate::value::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while validating or running a matcher.
#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("invalid match_type '{0}', expected one of: first, last, all")]
    InvalidMode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const MATCH_FIRST: &str = "first";
const MATCH_LAST: &str = "last";
const MATCH_ALL: &str = "all";

fn default_match_type() -> String {
    MATCH_FIRST.to_string()
}

/// Matcher configuration as declared by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchSpec {
    /// Regular expression searched for on each line.
    pub regex: String,
    /// Which matches to keep: `first`, `last` or `all`.
    #[serde(default = "default_match_type")]
    pub match_type: String,
    /// Return whether at least this many lines matched.
    #[serde(default)]
    pub threshold: Option<usize>,
    /// Expected values (`"10"`) or inclusive ranges (`"1-5"`, `"-3--1"`).
    #[serde(default)]
    pub expected: Option<Vec<String>>,
}

impl MatchSpec {
    /// Create a spec with the default match type and no overrides.
    #[must_use]
    pub fn new(regex: &str) -> Self {
        Self {
            regex: regex.to_string(),
            match_type: default_match_type(),
            threshold: None,
            expected: None,
        }
    }

    #[must_use]
    pub fn with_match_type(mut self, match_type: &str) -> Self {
        self.match_type = match_type.to_string();
        self
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn with_expected(mut self, expected: &[&str]) -> Self {
        self.expected = Some(expected.iter().map(ToString::to_string).collect());
        self
    }

    /// Validate the spec and decide its match policy.
    ///
    /// # Errors
    /// Returns an error if:
    /// - the regex does not compile (`InvalidPattern`)
    /// - an expected entry is not a number or range (`InvalidValue`)
    /// - a range is malformed or has `low > high` (`InvalidRange`)
    /// - the match type is unknown (`InvalidMode`)
    pub fn validate(&self) -> Result<ValidatedMatcher, MatcherError> {
        let pattern = Regex::new(&self.regex).map_err(|e| MatcherError::InvalidPattern {
            pattern: self.regex.clone(),
            source: e,
        })?;

        let expected = self
            .expected
            .iter()
            .flatten()
            .map(|item| ExpectedSpec::parse(item))
            .collect::<Result<Vec<_>, _>>()?;

        let mode = match self.match_type.as_str() {
            MATCH_FIRST => MatchPolicy::First,
            MATCH_LAST => MatchPolicy::Last,
            MATCH_ALL => MatchPolicy::All,
            other => return Err(MatcherError::InvalidMode(other.to_string())),
        };

        let policy = if let Some(threshold) = self.threshold {
            MatchPolicy::Threshold(threshold)
        } else if !expected.is_empty() {
            MatchPolicy::Expected(expected)
        } else {
            mode
        };

        Ok(ValidatedMatcher { pattern, policy })
    }
}

/// A single expected value or inclusive range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpectedSpec {
    Exact(f64),
    Range { low: f64, high: f64 },
}

fn range_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(-?[0-9]*\.?[0-9]*)-(-?.*)").ok())
        .as_ref()
}

/// A dash after the first character marks a range; a leading dash is a sign.
fn has_inner_dash(s: &str) -> bool {
    s.char_indices().skip(1).any(|(_, c)| c == '-')
}

fn parse_number(s: &str) -> Result<f64, MatcherError> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| !n.is_nan())
        .ok_or_else(|| MatcherError::InvalidValue(s.to_string()))
}

impl ExpectedSpec {
    /// Parse an expected entry such as `"10"`, `"1.5-3"` or `"-5--1"`.
    ///
    /// # Errors
    /// Returns `InvalidValue` for non-numeric bounds and `InvalidRange` for a
    /// malformed upper bound or a range whose lower bound exceeds its upper.
    pub fn parse(item: &str) -> Result<Self, MatcherError> {
        if !has_inner_dash(item) {
            return parse_number(item).map(Self::Exact);
        }

        let captures = range_regex()
            .and_then(|re| re.captures(item))
            .ok_or_else(|| MatcherError::InvalidValue(item.to_string()))?;
        let low = captures.get(1).map_or("", |m| m.as_str());
        let high = captures.get(2).map_or("", |m| m.as_str());

        if has_inner_dash(high) {
            return Err(MatcherError::InvalidRange(item.to_string()));
        }

        let low = parse_number(low)?;
        let high = parse_number(high)?;
        if high < low {
            return Err(MatcherError::InvalidRange(item.to_string()));
        }

        Ok(Self::Range { low, high })
    }

    /// Check whether `value` equals this literal or falls inside this range.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn accepts(&self, value: f64) -> bool {
        match *self {
            Self::Exact(expected) => value == expected,
            Self::Range { low, high } => low <= value && value <= high,
        }
    }
}

/// How the collected matches are reduced to a value.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchPolicy {
    First,
    Last,
    All,
    /// Whether at least this many lines matched.
    Threshold(usize),
    /// One boolean per match: does it satisfy any expected entry.
    Expected(Vec<ExpectedSpec>),
}

/// A compiled matcher, ready to run against any number of streams.
#[derive(Debug, Clone)]
pub struct ValidatedMatcher {
    pattern: Regex,
    policy: MatchPolicy,
}

impl ValidatedMatcher {
    #[must_use]
    pub const fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Collect the first match on every line, in line order.
    ///
    /// Lines are decoded lossily so stray non-UTF-8 output does not abort
    /// the scan.
    ///
    /// # Errors
    /// Returns `MatcherError::Io` if reading the stream fails.
    pub fn collect_matches<R: BufRead>(&self, mut reader: R) -> Result<Vec<String>, MatcherError> {
        let mut matches = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(m) = self.pattern.find(line) {
                matches.push(m.as_str().to_string());
            }
        }

        Ok(matches)
    }

    /// Scan the stream and reduce the matches according to the policy.
    ///
    /// # Errors
    /// Returns `MatcherError::Io` if reading the stream fails.
    pub fn extract<R: BufRead>(&self, reader: R) -> Result<Value, MatcherError> {
        let matches = self.collect_matches(reader)?;
        Ok(self.reduce(matches))
    }

    /// Reduce already collected matches according to the policy.
    #[must_use]
    pub fn reduce(&self, matches: Vec<String>) -> Value {
        match &self.policy {
            MatchPolicy::Threshold(threshold) => Value::Bool(matches.len() >= *threshold),
            MatchPolicy::Expected(expected) => Value::List(
                matches
                    .iter()
                    .map(|m| {
                        let accepted = m
                            .trim()
                            .parse::<f64>()
                            .is_ok_and(|n| expected.iter().any(|spec| spec.accepts(n)));
                        Value::Bool(accepted)
                    })
                    .collect(),
            ),
            MatchPolicy::First => matches.into_iter().next().map_or(Value::Null, Value::Str),
            MatchPolicy::Last => matches.into_iter().last().map_or(Value::Null, Value::Str),
            MatchPolicy::All => Value::List(matches.into_iter().map(Value::Str).collect()),
        }
    }
}
