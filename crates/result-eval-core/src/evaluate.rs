//! Evaluation keys and dependency resolution.
//!
//! Evaluations may reference each other in any declaration order. They are
//! resolved in passes: each pass evaluates every pending key whose
//! references are all resolved. A pass that makes no progress means the
//! remaining keys form a cycle.

use crate::expr::{EvalError, Expression, ParseError};
use crate::value::{RESULT_KEY, Results, is_base_key};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Expression used for `result` when nothing else provides it.
pub const DEFAULT_RESULT_EXPR: &str = "return_value == 0";

/// Evaluation key to expression source, as declared in configuration.
pub type Evaluations = BTreeMap<String, String>;

/// Evaluation key to parsed expression.
pub type ParsedEvaluations = BTreeMap<String, Expression>;

/// Errors raised while checking or resolving evaluations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("evaluation key '{0}' is reserved and cannot be redefined")]
    ReservedKey(String),
    #[error("error parsing evaluation '{key}' ('{expr}'): {source}\n{}", .source.context)]
    Parse {
        key: String,
        expr: String,
        #[source]
        source: ParseError,
    },
    #[error("evaluations have circular references: {}", .keys.join(", "))]
    CyclicReference { keys: Vec<String> },
    #[error("error evaluating '{key}' ('{expr}'): {source}")]
    Runtime {
        key: String,
        expr: String,
        #[source]
        source: EvalError,
    },
}

/// Check evaluations without any concrete values: no key may be a reserved
/// base key and every expression must parse.
///
/// # Errors
/// Returns the first problem found, in key order.
pub fn check_evaluations(evaluations: &Evaluations) -> Result<ParsedEvaluations, EvaluationError> {
    evaluations
        .iter()
        .map(|(key, expr)| {
            if is_base_key(key) {
                return Err(EvaluationError::ReservedKey(key.clone()));
            }
            let parsed = Expression::parse(expr).map_err(|source| EvaluationError::Parse {
                key: key.clone(),
                expr: expr.clone(),
                source,
            })?;
            Ok((key.clone(), parsed))
        })
        .collect()
}

/// Resolve already parsed evaluations and store their values in `results`.
///
/// If neither `results` nor `evaluations` provide a `result` key, it is
/// computed from [`DEFAULT_RESULT_EXPR`].
///
/// # Errors
/// Returns `CyclicReference` if some keys can never be resolved, or
/// `Runtime` for the first expression that fails to evaluate.
pub fn evaluate_parsed(
    results: &mut Results,
    evaluations: &ParsedEvaluations,
) -> Result<(), EvaluationError> {
    let default_result;
    let mut pending: BTreeMap<&str, &Expression> = evaluations
        .iter()
        .map(|(key, expr)| (key.as_str(), expr))
        .collect();

    if !results.contains_key(RESULT_KEY) && !pending.contains_key(RESULT_KEY) {
        default_result =
            Expression::parse(DEFAULT_RESULT_EXPR).map_err(|source| EvaluationError::Parse {
                key: RESULT_KEY.to_string(),
                expr: DEFAULT_RESULT_EXPR.to_string(),
                source,
            })?;
        pending.insert(RESULT_KEY, &default_result);
    }

    let mut pass = 0;
    while !pending.is_empty() {
        pass += 1;
        let ready: Vec<&str> = pending
            .iter()
            .filter(|(_, expr)| {
                expr.references()
                    .iter()
                    .all(|reference| !pending.contains_key(reference.as_str()))
            })
            .map(|(key, _)| *key)
            .collect();

        if ready.is_empty() {
            return Err(EvaluationError::CyclicReference {
                keys: pending.keys().map(ToString::to_string).collect(),
            });
        }
        debug!(pass, ready = ?ready, remaining = pending.len(), "resolving evaluations");

        for key in ready {
            let Some(expr) = pending.remove(key) else {
                continue;
            };
            let value = expr
                .evaluate(results)
                .map_err(|source| EvaluationError::Runtime {
                    key: key.to_string(),
                    expr: expr.source().to_string(),
                    source,
                })?;
            results.insert(key, value);
        }
    }

    Ok(())
}

/// Check, parse and resolve `evaluations` against `results`.
///
/// # Errors
/// Returns any error from [`check_evaluations`] or [`evaluate_parsed`].
pub fn evaluate_results(
    results: &mut Results,
    evaluations: &Evaluations,
) -> Result<(), EvaluationError> {
    let parsed = check_evaluations(evaluations)?;
    evaluate_parsed(results, &parsed)
}
