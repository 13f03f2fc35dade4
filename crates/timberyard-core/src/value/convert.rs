//! Total conversions between value variants

use std::fmt;

use super::{Array, Object, Value};

const TRUTHY: [&str; 5] = ["true", "yes", "on", "enabled", "1"];

impl Value {
    /// Numeric form. Unparseable strings, objects and arrays yield NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Object(_) | Value::Array(_) => f64::NAN,
        }
    }

    /// Truthiness. Strings are true when they spell one of
    /// `true`, `yes`, `on`, `enabled` or `1` in any case.
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Null => false,
            Value::String(s) => {
                let s = s.trim();
                TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(s))
            }
            Value::Number(n) => *n > 0.0,
            Value::Boolean(b) => *b,
            Value::Object(_) | Value::Array(_) => true,
        }
    }

    /// Object form. Arrays are keyed by index, scalars by the empty key.
    pub fn to_object(&self) -> Object {
        match self {
            Value::Null => Object::new(),
            Value::Object(map) => map.clone(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            scalar => Object::from([(String::new(), scalar.clone())]),
        }
    }

    /// Array form. Objects yield their values in key order.
    pub fn to_array(&self) -> Array {
        match self {
            Value::Null => Array::new(),
            Value::Array(items) => items.clone(),
            Value::Object(map) => map.values().cloned().collect(),
            scalar => vec![scalar.clone()],
        }
    }
}

/// Integral numbers print without a fractional part
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// String form: null is empty, containers render as compact JSON
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) => f.write_str(s),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Object(_) | Value::Array(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}
