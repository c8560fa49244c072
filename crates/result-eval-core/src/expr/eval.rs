//! Evaluation of expression trees against a results namespace.

use super::ast::{BinaryOp, CompareOp, Expr, Function, LogicalOp, Segment, UnaryOp, VarRef};
use crate::value::{Results, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while evaluating a parsed expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("'{reference}' has no element '{segment}'")]
    MissingElement { reference: String, segment: String },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in '{0}'")]
    Overflow(String),
    #[error("{func}(): {message}")]
    InvalidArgument { func: &'static str, message: String },
}

/// Evaluate `expr` using values from `results`.
///
/// # Errors
/// Returns an `EvalError` on missing keys, type mismatches, division by zero
/// or arithmetic overflow.
pub fn evaluate(expr: &Expr, results: &Results) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(var) => resolve(var, results).map(|v| auto_type(&v)),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, results))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Unary { op, operand } => unary(*op, evaluate(operand, results)?),
        Expr::Binary { op, lhs, rhs } => {
            binary(*op, &evaluate(lhs, results)?, &evaluate(rhs, results)?)
        }
        Expr::Compare { op, lhs, rhs } => {
            compare(*op, &evaluate(lhs, results)?, &evaluate(rhs, results)?).map(Value::Bool)
        }
        Expr::Logical { op, lhs, rhs } => {
            let left = expect_bool(&evaluate(lhs, results)?, op_name(*op))?;
            let short_circuit = match op {
                LogicalOp::And => !left,
                LogicalOp::Or => left,
            };
            if short_circuit {
                return Ok(Value::Bool(left));
            }
            expect_bool(&evaluate(rhs, results)?, op_name(*op)).map(Value::Bool)
        }
        Expr::Call { func, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, results))
                .collect::<Result<Vec<_>, _>>()?;
            call(*func, &args)
        }
    }
}

const fn op_name(op: LogicalOp) -> &'static str {
    match op {
        LogicalOp::And => "and",
        LogicalOp::Or => "or",
    }
}

fn expect_bool(value: &Value, context: &str) -> Result<bool, EvalError> {
    value.as_bool().ok_or_else(|| {
        EvalError::TypeMismatch(format!(
            "'{context}' needs bool operands, got {}",
            value.type_name()
        ))
    })
}

fn resolve(var: &VarRef, results: &Results) -> Result<Value, EvalError> {
    let root = results
        .get(&var.key)
        .ok_or_else(|| EvalError::UnknownKey(var.key.clone()))?;
    walk(root, &var.path, var)
}

fn walk(value: &Value, path: &[Segment], var: &VarRef) -> Result<Value, EvalError> {
    let Some((segment, rest)) = path.split_first() else {
        return Ok(value.clone());
    };

    let missing = |segment: String| EvalError::MissingElement {
        reference: var.to_string(),
        segment,
    };

    match (segment, value) {
        (Segment::Wildcard, Value::List(items)) => items
            .iter()
            .map(|item| walk(item, rest, var))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (Segment::Wildcard, Value::Map(map)) => map
            .values()
            .map(|item| walk(item, rest, var))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (Segment::Index(i), Value::List(items)) => items
            .get(*i)
            .ok_or_else(|| missing(i.to_string()))
            .and_then(|item| walk(item, rest, var)),
        (Segment::Index(i), Value::Map(map)) => map
            .get(&i.to_string())
            .ok_or_else(|| missing(i.to_string()))
            .and_then(|item| walk(item, rest, var)),
        (Segment::Field(name), Value::Map(map)) => map
            .get(name)
            .ok_or_else(|| missing(name.clone()))
            .and_then(|item| walk(item, rest, var)),
        (_, other) => Err(EvalError::TypeMismatch(format!(
            "cannot index into {} while resolving '{var}'",
            other.type_name()
        ))),
    }
}

/// Read text values that look like numbers or booleans as those types.
///
/// Values extracted from test output are always text; this lets
/// expressions do arithmetic on them.
fn auto_type(value: &Value) -> Value {
    match value {
        Value::Str(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::Int(i)
            } else if looks_like_float(trimmed) {
                trimmed
                    .parse::<f64>()
                    .map_or_else(|_| value.clone(), Value::Float)
            } else if trimmed.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if trimmed.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                value.clone()
            }
        }
        Value::List(items) => Value::List(items.iter().map(auto_type).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), auto_type(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
        other => other.clone(),
    }
}

/// Rejects `inf`, `nan` and friends, which `f64::from_str` would accept.
fn looks_like_float(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    #[allow(clippy::cast_precision_loss)]
    const fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(x) => x,
        }
    }

    const fn into_value(self) -> Value {
        match self {
            Self::Int(i) => Value::Int(i),
            Self::Float(x) => Value::Float(x),
        }
    }
}

const fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(x) => Some(Num::Float(*x)),
        _ => None,
    }
}

fn expect_num(value: &Value, context: &str) -> Result<Num, EvalError> {
    as_num(value).ok_or_else(|| {
        EvalError::TypeMismatch(format!(
            "'{context}' needs numeric operands, got {}",
            value.type_name()
        ))
    })
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => expect_bool(&value, "not").map(|b| Value::Bool(!b)),
        UnaryOp::Neg => match expect_num(&value, "-")? {
            Num::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| EvalError::Overflow(format!("-{i}"))),
            Num::Float(x) => Ok(Value::Float(-x)),
        },
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let symbol = op.symbol();
    let a = expect_num(lhs, symbol)?;
    let b = expect_num(rhs, symbol)?;
    let overflow = || EvalError::Overflow(format!("{lhs} {symbol} {rhs}"));

    let result = match (op, a, b) {
        (BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod, _, b) if b.as_f64() == 0.0 => {
            return Err(EvalError::DivisionByZero);
        }
        (BinaryOp::Add, Num::Int(x), Num::Int(y)) => Num::Int(x.checked_add(y).ok_or_else(overflow)?),
        (BinaryOp::Sub, Num::Int(x), Num::Int(y)) => Num::Int(x.checked_sub(y).ok_or_else(overflow)?),
        (BinaryOp::Mul, Num::Int(x), Num::Int(y)) => Num::Int(x.checked_mul(y).ok_or_else(overflow)?),
        (BinaryOp::FloorDiv, Num::Int(x), Num::Int(y)) => {
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) {
                Num::Int(q - 1)
            } else {
                Num::Int(q)
            }
        }
        (BinaryOp::Mod, Num::Int(_), Num::Int(-1)) => Num::Int(0),
        (BinaryOp::Mod, Num::Int(x), Num::Int(y)) => {
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (y < 0)) {
                Num::Int(r + y)
            } else {
                Num::Int(r)
            }
        }
        (BinaryOp::Pow, Num::Int(x), Num::Int(y)) if y >= 0 => {
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            Num::Int(x.checked_pow(exp).ok_or_else(overflow)?)
        }
        (op, a, b) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Num::Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                BinaryOp::FloorDiv => (x / y).floor(),
                BinaryOp::Mod => {
                    let r = x % y;
                    if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                        r + y
                    } else {
                        r
                    }
                }
                BinaryOp::Pow => x.powf(y),
            })
        }
    };

    Ok(result.into_value())
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    let ordering = match (lhs, rhs) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            match (as_num(lhs), as_num(rhs)) {
                (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
                _ => None,
            }
        }
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => {
            return match op {
                CompareOp::Eq => Ok(lhs == rhs),
                CompareOp::Ne => Ok(lhs != rhs),
                _ => Err(EvalError::TypeMismatch(format!(
                    "cannot order {} and {} with '{}'",
                    lhs.type_name(),
                    rhs.type_name(),
                    op.symbol()
                ))),
            };
        }
    };

    Ok(match op {
        CompareOp::Eq => ordering == Some(Ordering::Equal),
        CompareOp::Ne => ordering != Some(Ordering::Equal),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    })
}

fn call(func: Function, args: &[Value]) -> Result<Value, EvalError> {
    let name = func.name();
    let invalid = |message: String| EvalError::InvalidArgument {
        func: name,
        message,
    };
    let Some((first, rest)) = args.split_first() else {
        return Err(invalid("missing argument".to_string()));
    };

    let numbers = |value: &Value| -> Result<Vec<Num>, EvalError> {
        match value {
            Value::List(items) => items.iter().map(|item| expect_num(item, name)).collect(),
            other => Err(invalid(format!("expected a list, got {}", other.type_name()))),
        }
    };
    let bools = |value: &Value| -> Result<Vec<bool>, EvalError> {
        match value {
            Value::List(items) => items.iter().map(|item| expect_bool(item, name)).collect(),
            other => Err(invalid(format!("expected a list, got {}", other.type_name()))),
        }
    };

    match func {
        Function::Len => match first {
            Value::List(items) => Ok(items.len()),
            Value::Map(map) => Ok(map.len()),
            Value::Str(s) => Ok(s.chars().count()),
            other => Err(invalid(format!("cannot take the length of {}", other.type_name()))),
        }
        .and_then(|n| i64::try_from(n).map_err(|_| EvalError::Overflow(format!("{name}()"))))
        .map(Value::Int),
        Function::Sum => {
            let nums = numbers(first)?;
            if nums.iter().all(|n| matches!(n, Num::Int(_))) {
                nums.iter()
                    .try_fold(0_i64, |acc, n| match n {
                        Num::Int(i) => acc.checked_add(*i),
                        Num::Float(_) => None,
                    })
                    .map(Value::Int)
                    .ok_or_else(|| EvalError::Overflow(format!("{name}()")))
            } else {
                Ok(Value::Float(nums.iter().map(|n| n.as_f64()).sum()))
            }
        }
        Function::Avg => {
            let nums = numbers(first)?;
            if nums.is_empty() {
                return Err(invalid("empty list".to_string()));
            }
            #[allow(clippy::cast_precision_loss)]
            let count = nums.len() as f64;
            Ok(Value::Float(nums.iter().map(|n| n.as_f64()).sum::<f64>() / count))
        }
        Function::Min | Function::Max => {
            let nums = numbers(first)?;
            let wanted = if func == Function::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            nums.into_iter()
                .reduce(|best, n| {
                    if n.as_f64().partial_cmp(&best.as_f64()) == Some(wanted) {
                        n
                    } else {
                        best
                    }
                })
                .map(Num::into_value)
                .ok_or_else(|| invalid("empty list".to_string()))
        }
        Function::All => bools(first).map(|b| Value::Bool(b.iter().all(|x| *x))),
        Function::Any => bools(first).map(|b| Value::Bool(b.iter().any(|x| *x))),
        Function::Abs => match expect_num(first, name)? {
            Num::Int(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| EvalError::Overflow(format!("{name}({i})"))),
            Num::Float(x) => Ok(Value::Float(x.abs())),
        },
        Function::Int => match first {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Float(x) => float_to_int(x.trunc(), name),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| invalid(format!("cannot convert '{s}' to int"))),
            other => Err(invalid(format!("cannot convert {} to int", other.type_name()))),
        },
        Function::Float => match first {
            Value::Int(_) | Value::Float(_) => {
                expect_num(first, name).map(|n| Value::Float(n.as_f64()))
            }
            Value::Str(s) if looks_like_float(s.trim()) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid(format!("cannot convert '{s}' to float"))),
            Value::Str(s) => Err(invalid(format!("cannot convert '{s}' to float"))),
            other => Err(invalid(format!("cannot convert {} to float", other.type_name()))),
        },
        Function::Round => {
            let x = expect_num(first, name)?.as_f64();
            match rest.first() {
                None => float_to_int(x.round_ties_even(), name),
                Some(digits) => {
                    let Value::Int(digits) = digits else {
                        return Err(invalid(format!(
                            "digits must be an int, got {}",
                            digits.type_name()
                        )));
                    };
                    let digits = i32::try_from(*digits)
                        .map_err(|_| invalid(format!("digits out of range: {digits}")))?;
                    let scale = 10_f64.powi(digits);
                    Ok(Value::Float((x * scale).round_ties_even() / scale))
                }
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_int(x: f64, name: &'static str) -> Result<Value, EvalError> {
    if x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Ok(Value::Int(x as i64))
    } else {
        Err(EvalError::InvalidArgument {
            func: name,
            message: format!("{x} does not fit in an int"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn results() -> Results {
        let per_file: BTreeMap<String, Value> = [
            (
                "a.out".to_string(),
                Value::Map([("speed".to_string(), Value::from("2.5"))].into()),
            ),
            (
                "b.out".to_string(),
                Value::Map([("speed".to_string(), Value::from("3.5"))].into()),
            ),
        ]
        .into();

        let mut results = Results::new();
        results.insert("return_value", 0_i64);
        results.insert("count", "7");
        results.insert("ratio", "0.5");
        results.insert("flag", "True");
        results.insert("name", "bench");
        results.insert("times", vec!["1", "2", "3"]);
        results.insert("checks", vec![true, false]);
        results.insert("per_file", Value::Map(per_file));
        results.insert("missing", Value::Null);
        results
    }

    fn eval(src: &str) -> Result<Value, Box<dyn std::error::Error>> {
        Ok(evaluate(&parse(src)?, &results())?)
    }

    fn eval_err(src: &str) -> Option<EvalError> {
        parse(src)
            .ok()
            .and_then(|expr| evaluate(&expr, &results()).err())
    }

    #[test]
    fn test_arithmetic() -> TestResult {
        assert_eq!(eval("1 + 2 * 3")?, Value::Int(7));
        assert_eq!(eval("7 / 2")?, Value::Float(3.5));
        assert_eq!(eval("7 // 2")?, Value::Int(3));
        assert_eq!(eval("-7 // 2")?, Value::Int(-4));
        assert_eq!(eval("-7 % 3")?, Value::Int(2));
        assert_eq!(eval("2 ^ 10")?, Value::Int(1024));
        assert_eq!(eval("2 ^ -1")?, Value::Float(0.5));
        assert_eq!(eval("-2 ^ 2")?, Value::Int(-4));
        assert_eq!(eval("1.5 + 1")?, Value::Float(2.5));
        assert_eq!(eval("(-9223372036854775807 - 1) % -1")?, Value::Int(0));
        assert_eq!(eval("7 % -1")?, Value::Int(0));
        Ok(())
    }

    #[test]
    fn test_text_values_are_typed() -> TestResult {
        assert_eq!(eval("count * 2")?, Value::Int(14));
        assert_eq!(eval("ratio + 1")?, Value::Float(1.5));
        assert_eq!(eval("flag and true")?, Value::Bool(true));
        assert_eq!(eval("sum(times)")?, Value::Int(6));
        assert_eq!(eval("name")?, Value::from("bench"));
        Ok(())
    }

    #[test]
    fn test_string_literals_are_not_typed() {
        assert!(matches!(
            eval_err("\"1\" + 1"),
            Some(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_comparisons() -> TestResult {
        assert_eq!(eval("return_value == 0")?, Value::Bool(true));
        assert_eq!(eval("count > 6.5")?, Value::Bool(true));
        assert_eq!(eval("name == \"bench\"")?, Value::Bool(true));
        assert_eq!(eval("name < \"zzz\"")?, Value::Bool(true));
        assert_eq!(eval("name == 1")?, Value::Bool(false));
        assert_eq!(eval("name != 1")?, Value::Bool(true));
        assert_eq!(eval("missing == missing")?, Value::Bool(true));
        assert!(matches!(
            eval_err("name < 1"),
            Some(EvalError::TypeMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn test_logic_short_circuits() -> TestResult {
        assert_eq!(eval("false and nope")?, Value::Bool(false));
        assert_eq!(eval("true or nope")?, Value::Bool(true));
        assert_eq!(eval("not (1 > 2)")?, Value::Bool(true));
        assert!(matches!(
            eval_err("1 and true"),
            Some(EvalError::TypeMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn test_paths() -> TestResult {
        assert_eq!(eval("times.1")?, Value::Int(2));
        assert_eq!(eval("avg(per_file.*.speed)")?, Value::Float(3.0));
        assert_eq!(
            eval_err("times.5"),
            Some(EvalError::MissingElement {
                reference: "times.5".to_string(),
                segment: "5".to_string(),
            })
        );
        assert_eq!(eval_err("nope"), Some(EvalError::UnknownKey("nope".to_string())));
        assert!(matches!(
            eval_err("count.0"),
            Some(EvalError::TypeMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn test_functions() -> TestResult {
        assert_eq!(eval("len(times)")?, Value::Int(3));
        assert_eq!(eval("len(name)")?, Value::Int(5));
        assert_eq!(eval("min(times)")?, Value::Int(1));
        assert_eq!(eval("max([1, 2.5, 2])")?, Value::Float(2.5));
        assert_eq!(eval("avg(times)")?, Value::Float(2.0));
        assert_eq!(eval("all(checks)")?, Value::Bool(false));
        assert_eq!(eval("any(checks)")?, Value::Bool(true));
        assert_eq!(eval("abs(-3)")?, Value::Int(3));
        assert_eq!(eval("int(3.9)")?, Value::Int(3));
        assert_eq!(eval("int(\"12\")")?, Value::Int(12));
        assert_eq!(eval("float(2)")?, Value::Float(2.0));
        assert_eq!(eval("round(2.5)")?, Value::Int(2));
        assert_eq!(eval("round(1.23456, 2)")?, Value::Float(1.23));
        assert_eq!(eval("sum([])")?, Value::Int(0));
        Ok(())
    }

    #[test]
    fn test_runtime_errors() {
        assert_eq!(eval_err("1 / 0"), Some(EvalError::DivisionByZero));
        assert_eq!(eval_err("1 % 0.0"), Some(EvalError::DivisionByZero));
        assert!(matches!(
            eval_err("9223372036854775807 + 1"),
            Some(EvalError::Overflow(_))
        ));
        assert!(matches!(
            eval_err("avg([])"),
            Some(EvalError::InvalidArgument { func: "avg", .. })
        ));
        assert!(matches!(
            eval_err("sum(count)"),
            Some(EvalError::InvalidArgument { func: "sum", .. })
        ));
        assert!(matches!(
            eval_err("all([1])"),
            Some(EvalError::TypeMismatch(_))
        ));
    }
}
