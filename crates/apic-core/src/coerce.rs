//! # Wire-Value Coercion
//!
//! Turns loosely typed wire values (path segments, query strings, header
//! lines, form or JSON bodies) into the type a [`Parameter`] declares.
//!
//! Coercion is total: it never fails. A value that no rule applies to is
//! returned unchanged so the validation stage can report it. Coercion is
//! also a projection, so coercing an already-coerced value is a no-op.
//!
//! ## Null sentinels
//!
//! When a parameter is nullable, these wire values become `null`:
//!
//! | Kind | Sentinels |
//! |------|-----------|
//! | integer, number | `null`, `"null"`, `false`, `""` |
//! | boolean | `null`, `"null"`, `""` |
//! | string, array | `null`, `"null"`, `0`, `false`, `""` |
//!
//! Objects are never coerced as containers.

use serde_json::{Number, Value};

use crate::parameter::{Parameter, ParameterKind};

/// Largest magnitude at which every integral `f64` is exactly representable.
const MAX_SAFE_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

impl Parameter {
    /// Coerce a raw wire value into this parameter's declared type.
    ///
    /// Never fails; see the module documentation for the per-kind rules.
    pub fn coerce(&self, raw: Value) -> Value {
        let nullable = self.is_nullable();
        match &self.kind {
            ParameterKind::Integer(_) => coerce_integer(raw, nullable),
            ParameterKind::Number(_) => coerce_number(raw, nullable),
            ParameterKind::Boolean => coerce_boolean(raw, nullable),
            ParameterKind::String(_) => coerce_string(raw, nullable),
            ParameterKind::Array(rules) => {
                coerce_array(raw, nullable, rules.items.as_deref())
            }
            ParameterKind::Object(_) => raw,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-kind rules
// ---------------------------------------------------------------------------

fn coerce_integer(raw: Value, nullable: bool) -> Value {
    if nullable && is_numeric_null_sentinel(&raw) {
        return Value::Null;
    }
    let coerced = match &raw {
        Value::Number(n) if n.is_i64() || n.is_u64() => None,
        Value::Number(n) => n.as_f64().and_then(integral).map(Value::from),
        Value::String(s) => match parse_numeric(s) {
            Some(Numeric::Int(i)) => Some(Value::from(i)),
            Some(Numeric::Float(f)) => integral(f).map(Value::from),
            None => None,
        },
        _ => None,
    };
    coerced.unwrap_or(raw)
}

fn coerce_number(raw: Value, nullable: bool) -> Value {
    if nullable && is_numeric_null_sentinel(&raw) {
        return Value::Null;
    }
    let coerced = match &raw {
        Value::String(s) => match parse_numeric(s) {
            Some(Numeric::Int(i)) => Some(Value::from(i)),
            Some(Numeric::Float(f)) => Number::from_f64(f).map(Value::Number),
            None => None,
        },
        _ => None,
    };
    coerced.unwrap_or(raw)
}

fn coerce_boolean(raw: Value, nullable: bool) -> Value {
    if nullable && (raw.is_null() || matches!(raw.as_str(), Some("null" | ""))) {
        return Value::Null;
    }
    match raw {
        Value::Array(mut items) if items.len() == 1 => {
            let only = items.pop().unwrap_or(Value::Null);
            coerce_boolean(only, nullable)
        }
        other => boolean_sentinel(&other).map(Value::Bool).unwrap_or(other),
    }
}

/// The boolean a non-null wire value stands for, if any.
fn boolean_sentinel(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Null => Some(false),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) if s == "1" || s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s == "0" || s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn coerce_string(raw: Value, nullable: bool) -> Value {
    if nullable && is_container_null_sentinel(&raw) {
        return Value::Null;
    }
    match raw {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Null => Value::String(String::new()),
        Value::Array(mut items) if items.len() == 1 => {
            let only = items.pop().unwrap_or(Value::Null);
            coerce_string(only, nullable)
        }
        other => other,
    }
}

fn coerce_array(raw: Value, nullable: bool, items: Option<&Parameter>) -> Value {
    if nullable && is_container_null_sentinel(&raw) {
        return Value::Null;
    }
    let elements = match raw {
        Value::Array(elements) => elements,
        Value::String(s) if s.contains(',') => s
            .split(',')
            .map(|piece| Value::String(piece.trim().to_string()))
            .collect(),
        Value::Object(_) => return raw,
        scalar => vec![scalar],
    };
    let elements = match items {
        Some(item) => elements.into_iter().map(|e| item.coerce(e)).collect(),
        None => elements,
    };
    Value::Array(elements)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_numeric_null_sentinel(raw: &Value) -> bool {
    match raw {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty() || s == "null",
        _ => false,
    }
}

fn is_container_null_sentinel(raw: &Value) -> bool {
    match raw {
        Value::Number(n) => n.as_f64() == Some(0.0),
        other => is_numeric_null_sentinel(other),
    }
}

/// The `i64` value of an integral, finite float.
fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_FLOAT_INT {
        Some(f as i64)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Int(i64),
    Float(f64),
}

/// Parse a decimal numeric string.
///
/// Accepts surrounding whitespace, an optional sign, a fractional part and
/// an exponent. Rejects `inf`, `NaN`, hex and anything non-finite.
fn parse_numeric(s: &str) -> Option<Numeric> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(i) = t.parse::<i64>() {
        return Some(Numeric::Int(i));
    }
    let plausible = t.bytes().any(|b| b.is_ascii_digit())
        && t
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !plausible {
        return None;
    }
    t.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Numeric::Float)
}
