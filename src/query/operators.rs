//! Value comparison primitives shared by predicate evaluation and ordering.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::error::StatementError;

// ============================================================================
// Value Comparison
// ============================================================================

/// Total order used for sorting.
///
/// - Both Null → Equal; Null sorts after everything else
/// - Numbers compare as f64 (NaN treated as Equal)
/// - Strings compare by codepoint, booleans false < true
/// - Cross-type → type rank: number(0), string(1), bool(2), other(3)
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(na), Value::Number(nb)) => {
            let fa = na.as_f64().unwrap_or(f64::NAN);
            let fb = nb.as_f64().unwrap_or(f64::NAN);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (Value::String(sa), Value::String(sb)) => sa.cmp(sb),
        (Value::Bool(ba), Value::Bool(bb)) => ba.cmp(bb),
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

/// Ordering for `<`, `<=`, `>`, `>=`: `None` when either side is null or the
/// types differ, so mixed comparisons never match.
pub fn compare_comparable(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() || type_rank(a) != type_rank(b) || type_rank(a) == 3 {
        return None;
    }
    Some(compare_values(a, b))
}

/// Equality used by `=`, `IN` and prefill checks.
///
/// Numbers compare numerically (`2` equals `2.0`); null never equals
/// anything; an array field equals a scalar when any element does.
pub fn values_equal(field: &Value, operand: &Value) -> bool {
    match (field, operand) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(items), scalar) if !scalar.is_array() => {
            items.iter().any(|item| values_equal(item, scalar))
        }
        _ => field == operand,
    }
}

// ============================================================================
// Field Path Resolution
// ============================================================================

/// Get a nested value from a record using a dot-separated path.
pub fn get_field_value<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

// ============================================================================
// LIKE
// ============================================================================

/// Compile a SQL LIKE pattern (`%` any run, `_` one char) into an anchored,
/// case-insensitive regex.
pub fn like_regex(pattern: &str) -> Result<Regex, StatementError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?is)^");
    let mut literal = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|e| StatementError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Text a value presents to LIKE: strings as-is, numbers and booleans via
/// their JSON rendering, everything else never matches.
pub fn like_subject(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
