//! # Value Type System
//!
//! The closed value algebra every intent operates over: number, string,
//! boolean, null, ordered sequence, and string-keyed mapping. No other
//! inhabitants are legal — functions, opaque handles, and cyclic values are
//! rejected at the boundary by [`validate_value`].
//!
//! ```
//! use ioc::value::Value;
//!
//! let v = Value::Object(vec![
//!     ("name".to_string(), Value::String("Alice".to_string())),
//!     ("age".to_string(), Value::Number(25.0)),
//! ]);
//! assert_eq!(v.kind(), ioc::value::ValueKind::Object);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::IocError;

/// The coarse kind of a [`Value`], used by `TypeCheck` predicates and by the
/// capability calculus for shape-only reasoning. IOC never infers types
/// beyond this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    String,
    Boolean,
    Array,
    Object,
    Null,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Null => "null",
        };
        write!(f, "{s}")
    }
}

/// A value in the IOC algebra. Recursive sum of number, string, boolean,
/// null, ordered sequence, and string-keyed mapping.
///
/// `Object` is represented as an ordered `Vec` of key/value pairs rather
/// than a `HashMap` so that structural equality and canonical pretty-printing
/// (used by CSE, see [`crate::optimizer`]) are deterministic without an extra
/// sort step on every comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
    Null,
}

impl Value {
    /// The coarse kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Null => ValueKind::Null,
        }
    }

    /// Look up a field on an object value. Returns `None` for non-objects
    /// and for missing keys — property access never panics.
    pub fn get_field(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Render the value as a string for contexts that need a string (e.g.
    /// lexicographic sort, `Join` reduction, string-typed literal display).
    /// This is the documented, not-normalized-for-speed canonical form.
    pub fn stringify(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::stringify).collect();
                format!("[{}]", parts.join(","))
            }
            Value::Object(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{k}:{}", v.stringify()))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
        }
    }

    /// Structural equality as used by `Compare(eq, ...)`, `Distinct`, and CSE
    /// constant comparison. `NaN` is never equal to anything, including
    /// itself, matching IEEE 754 and documented in §4.6's numeric semantics.
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter()
                            .find(|(k2, _)| k2 == k)
                            .is_some_and(|(_, v2)| v.structural_eq(v2))
                    })
            }
            _ => false,
        }
    }

    /// Total order over values used by `Sort` without a key and by canonical
    /// signature construction in CSE. Per §4.6 / §9 open question 2, this is
    /// lexicographic over the stringified form — deterministic, not numeric.
    pub fn lexicographic_cmp(&self, other: &Value) -> Ordering {
        self.stringify().cmp(&other.stringify())
    }

    /// Truthiness used where a `Value` must act as a boolean condition, e.g.
    /// a `Conditional`'s predicate result coerced from an arbitrary literal.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Null => false,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }
}

/// Render a double without forcing a trailing `.0` for integral values,
/// matching how most host expression grammars print numeric literals.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stringify())
    }
}

/// Property segments that would let a `Property` transform reach into the
/// host's prototype chain. Checked again in [`crate::security`] at every
/// boundary; kept here too since it is fundamentally a property of `Value`
/// as a *carrier* of untrusted data, not just of the DSL surface.
pub const FORBIDDEN_PROPERTY_SEGMENTS: &[&str] =
    &["__proto__", "constructor", "prototype", "valueOf", "toString"];

/// Traverse `v` and fail with [`IocError::UnsafeValue`] if it is not fully
/// composed of the six legal `Value` variants, or if any object key is one
/// of the [`FORBIDDEN_PROPERTY_SEGMENTS`]. Rust's `Value` enum is already
/// closed over legal inhabitants (no callables or cycles are representable
/// in an owned tree), so this mainly guards object keys and recursion depth
/// against pathological nesting used as a denial-of-service vector.
pub fn validate_value(v: &Value) -> Result<(), IocError> {
    validate_value_depth(v, 0)
}

const MAX_VALUE_DEPTH: usize = 256;

fn validate_value_depth(v: &Value, depth: usize) -> Result<(), IocError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(IocError::UnsafeValue {
            detail: format!("value nesting exceeds maximum depth of {MAX_VALUE_DEPTH}"),
        });
    }
    match v {
        Value::Array(items) => {
            for item in items {
                validate_value_depth(item, depth + 1)?;
            }
            Ok(())
        }
        Value::Object(fields) => {
            for (key, value) in fields {
                if FORBIDDEN_PROPERTY_SEGMENTS.contains(&key.as_str()) {
                    return Err(IocError::UnsafeValue {
                        detail: format!("object key '{key}' is a forbidden property name"),
                    });
                }
                validate_value_depth(value, depth + 1)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Value::Number(1.0).kind(), ValueKind::Number);
        assert_eq!(Value::Null.kind(), ValueKind::Null);
    }

    #[test]
    fn structural_eq_ignores_object_field_order() {
        let a = Value::Object(vec![
            ("x".to_string(), Value::Number(1.0)),
            ("y".to_string(), Value::Number(2.0)),
        ]);
        let b = Value::Object(vec![
            ("y".to_string(), Value::Number(2.0)),
            ("x".to_string(), Value::Number(1.0)),
        ]);
        assert!(a.structural_eq(&b));
    }

    #[test]
    fn nan_is_never_equal() {
        let nan = Value::Number(f64::NAN);
        assert!(!nan.structural_eq(&nan));
    }

    #[test]
    fn forbidden_property_name_rejected() {
        let v = Value::Object(vec![("__proto__".to_string(), Value::Null)]);
        assert!(validate_value(&v).is_err());
    }

    #[test]
    fn deeply_nested_array_rejected() {
        let mut v = Value::Null;
        for _ in 0..MAX_VALUE_DEPTH + 10 {
            v = Value::Array(vec![v]);
        }
        assert!(validate_value(&v).is_err());
    }

    #[test]
    fn lexicographic_cmp_is_string_order() {
        assert_eq!(
            Value::Number(9.0).lexicographic_cmp(&Value::Number(10.0)),
            Ordering::Greater
        );
    }
}
