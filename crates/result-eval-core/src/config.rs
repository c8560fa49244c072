//! Results configuration loader.
//!
//! A results config declares, for one kind of test, which values to extract
//! from its output and which values to compute from them:
//!
//! ```yaml
//! parse:
//!   regex:
//!     speed:
//!       regex: '[0-9.]+'
//! evaluate:
//!   fast: 'speed > 100'
//! ```

use crate::evaluate::{EvaluationError, Evaluations, ParsedEvaluations, check_evaluations};
use crate::matcher::{MatchSpec, MatcherError, ValidatedMatcher};
use crate::plugin::{RegexParser, ResultParser};
use crate::value::is_base_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during config loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("invalid result parser '{key}': {source}")]
    Matcher {
        key: String,
        #[source]
        source: MatcherError,
    },
    #[error("result parser key '{0}' is reserved and cannot be redefined")]
    ReservedKey(String),
    #[error("key '{0}' is both parsed and evaluated")]
    DuplicateKey(String),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Result parsers, grouped by parser name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParseSection {
    #[serde(default)]
    pub regex: BTreeMap<String, MatchSpec>,
}

/// A results config as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultsConfig {
    #[serde(default)]
    pub parse: ParseSection,
    #[serde(default)]
    pub evaluate: Evaluations,
}

/// A results config with every matcher compiled and every expression parsed.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub matchers: BTreeMap<String, ValidatedMatcher>,
    pub evaluations: ParsedEvaluations,
}

/// Load a results config from a YAML file.
///
/// An empty file yields an empty config.
///
/// # Errors
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn load_config(path: &Path) -> Result<ResultsConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    ResultsConfig::from_yaml(&content)
}

impl ResultsConfig {
    /// Parse a results config from YAML text.
    ///
    /// # Errors
    /// Returns `ConfigError::Yaml` if the text is not a valid config.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(content)?)
    }

    /// Validate every matcher and statically check every evaluation.
    ///
    /// # Errors
    /// Returns an error if:
    /// - a matcher key is a reserved base key
    /// - a matcher fails validation
    /// - a key is declared both as a matcher and an evaluation
    /// - an evaluation key is reserved or its expression does not parse
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let parser = RegexParser;
        let mut matchers = BTreeMap::new();

        for (key, spec) in &self.parse.regex {
            if is_base_key(key) {
                return Err(ConfigError::ReservedKey(key.clone()));
            }
            if self.evaluate.contains_key(key) {
                return Err(ConfigError::DuplicateKey(key.clone()));
            }
            let matcher = parser
                .check_args(spec)
                .map_err(|source| ConfigError::Matcher {
                    key: key.clone(),
                    source,
                })?;
            matchers.insert(key.clone(), matcher);
        }

        let evaluations = check_evaluations(&self.evaluate)?;

        Ok(ValidatedConfig {
            matchers,
            evaluations,
        })
    }
}
