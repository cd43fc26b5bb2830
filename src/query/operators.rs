//! Filter evaluation over JSON rows.
//!
//! Field conditions are either a direct value (equality) or an operator
//! object such as `{ "$gte": "2024-05-01" }`. Top-level `$and`, `$or` and
//! `$not` combine sub-filters. Comparison operators lift over array values:
//! `{ "persons": "Anna" }` matches a row whose `persons` array contains
//! `"Anna"`.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::QueryError;

const COMPARISON_OPS: &[&str] = &[
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$regex", "$size",
];
const ARRAY_OPS: &[&str] = &["$contains", "$containsAny", "$all"];

// ============================================================================
// Ordering
// ============================================================================

/// Total order over JSON values used for sorting and range operators.
///
/// Nulls sort last. Mixed types order as number < string < bool < other.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        _ => 3,
    }
}

/// Resolve a dot-separated path inside a row.
pub fn get_field_value<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(row, |current, part| current.as_object()?.get(part))
}

/// True for a non-empty object whose keys all start with `$`.
pub fn is_operator(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')),
        None => false,
    }
}

// ============================================================================
// Operators
// ============================================================================

fn ordered(value: &Value, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if value.is_null() || operand.is_null() {
        return false;
    }
    accept(compare_values(value, operand))
}

fn scalar_op(value: &Value, op: &str, operand: &Value) -> Result<bool, QueryError> {
    let matched = match op {
        "$eq" => value == operand,
        "$ne" => value != operand,
        "$gt" => ordered(value, operand, |o| o == Ordering::Greater),
        "$gte" => ordered(value, operand, |o| o != Ordering::Less),
        "$lt" => ordered(value, operand, |o| o == Ordering::Less),
        "$lte" => ordered(value, operand, |o| o != Ordering::Greater),
        "$in" | "$nin" => {
            let hit = operand.as_array().is_some_and(|items| match value.as_array() {
                Some(values) => values.iter().any(|v| items.contains(v)),
                None => items.contains(value),
            });
            if op == "$in" {
                hit
            } else {
                !hit
            }
        }
        "$regex" => match (value.as_str(), operand.as_str()) {
            (Some(text), Some(pattern)) => Regex::new(pattern)
                .map_err(|e| QueryError::InvalidRegex(e.to_string()))?
                .is_match(text),
            _ => false,
        },
        "$size" => match (value.as_array(), operand.as_u64()) {
            (Some(arr), Some(n)) => arr.len() as u64 == n,
            _ => false,
        },
        other => return Err(QueryError::UnknownOperator(other.to_string())),
    };
    Ok(matched)
}

/// Array lifting: a scalar operand against an array value matches when any
/// element matches (`$ne`: when every element matches).
fn lifted_op(value: &Value, op: &str, operand: &Value) -> Result<bool, QueryError> {
    if let (Some(items), false) = (value.as_array(), operand.is_array()) {
        match op {
            "$eq" | "$gt" | "$gte" | "$lt" | "$lte" => {
                for item in items {
                    if scalar_op(item, op, operand)? {
                        return Ok(true);
                    }
                }
                return Ok(false);
            }
            "$ne" => {
                for item in items {
                    if !scalar_op(item, op, operand)? {
                        return Ok(false);
                    }
                }
                return Ok(true);
            }
            _ => {}
        }
    }
    scalar_op(value, op, operand)
}

fn array_op(value: &Value, op: &str, operand: &Value) -> Option<bool> {
    let items = value.as_array();
    let matched = match op {
        "$contains" => items.is_some_and(|arr| arr.contains(operand)),
        "$containsAny" => match (items, operand.as_array()) {
            (Some(arr), Some(targets)) => targets.iter().any(|t| arr.contains(t)),
            _ => false,
        },
        "$all" => match (items, operand.as_array()) {
            (Some(arr), Some(targets)) => targets.iter().all(|t| arr.contains(t)),
            _ => false,
        },
        _ => return None,
    };
    Some(matched)
}

fn evaluate_ops(value: Option<&Value>, ops: &Map<String, Value>) -> Result<bool, QueryError> {
    for (op, operand) in ops {
        if op == "$exists" {
            if operand.as_bool().unwrap_or(false) != value.is_some() {
                return Ok(false);
            }
            continue;
        }
        let value = value.unwrap_or(&Value::Null);
        let matched = match array_op(value, op, operand) {
            Some(m) => m,
            None => lifted_op(value, op, operand)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// Filters
// ============================================================================

/// Evaluate `filter` against `row`. A non-object filter matches everything.
pub fn matches_filter(row: &Value, filter: &Value) -> Result<bool, QueryError> {
    let Some(conditions) = filter.as_object() else {
        return Ok(true);
    };

    if let Some(subs) = conditions.get("$and").and_then(Value::as_array) {
        for sub in subs {
            if !matches_filter(row, sub)? {
                return Ok(false);
            }
        }
    }

    if let Some(subs) = conditions.get("$or").and_then(Value::as_array) {
        let mut any = false;
        for sub in subs {
            if matches_filter(row, sub)? {
                any = true;
                break;
            }
        }
        if !any {
            return Ok(false);
        }
    }

    if let Some(sub) = conditions.get("$not") {
        if matches_filter(row, sub)? {
            return Ok(false);
        }
    }

    for (field, condition) in conditions {
        if field.starts_with('$') {
            continue;
        }
        let value = get_field_value(row, field);
        let matched = match condition.as_object() {
            Some(ops) if is_operator(condition) => evaluate_ops(value, ops)?,
            _ => lifted_op(value.unwrap_or(&Value::Null), "$eq", condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Check a filter for unknown operators, malformed logical operators and
/// invalid regular expressions without evaluating it against a row.
pub fn validate_filter(filter: &Value) -> Result<(), QueryError> {
    validate_at(filter, "")
}

fn validate_at(filter: &Value, path: &str) -> Result<(), QueryError> {
    let Some(conditions) = filter.as_object() else {
        return Err(QueryError::InvalidFilter {
            path: display_path(path),
            reason: "filter must be an object".to_string(),
        });
    };

    for (key, condition) in conditions {
        let here = join_path(path, key);
        match key.as_str() {
            "$and" | "$or" => {
                let Some(subs) = condition.as_array() else {
                    return Err(QueryError::InvalidFilter {
                        path: here,
                        reason: "expected an array of filters".to_string(),
                    });
                };
                for (i, sub) in subs.iter().enumerate() {
                    validate_at(sub, &format!("{here}[{i}]"))?;
                }
            }
            "$not" => validate_at(condition, &here)?,
            k if k.starts_with('$') => return Err(QueryError::UnknownOperator(k.to_string())),
            _ => {
                if let Some(ops) = condition.as_object().filter(|_| is_operator(condition)) {
                    validate_ops(ops)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_ops(ops: &Map<String, Value>) -> Result<(), QueryError> {
    for (op, operand) in ops {
        let known = op == "$exists"
            || COMPARISON_OPS.contains(&op.as_str())
            || ARRAY_OPS.contains(&op.as_str());
        if !known {
            return Err(QueryError::UnknownOperator(op.clone()));
        }
        if op == "$regex" {
            if let Some(pattern) = operand.as_str() {
                Regex::new(pattern).map_err(|e| QueryError::InvalidRegex(e.to_string()))?;
            }
        }
    }
    Ok(())
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}
