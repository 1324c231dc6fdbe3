//! Pure functions of a single implicit argument `x`.

use serde::{Deserialize, Serialize};

use super::predicate::{compile_validated_regex, Predicate};
use crate::error::{BudgetKind, IocError};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringOp {
    Uppercase,
    Lowercase,
    Trim,
    Concat,
    Substring,
    Split,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayOp {
    Length,
    Reverse,
    Slice,
    Concat,
    At,
}

/// A pure function of `x`. `Property(path)` requires a non-empty path of
/// identifiers; enforced at construction time by
/// [`Transform::property`]/[`crate::security::validate_transform`], not by
/// the type itself, since deserialized programs must also be checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Transform {
    Identity,
    Constant { value: Value },
    Property { path: Vec<String> },
    Arithmetic {
        op: ArithmeticOp,
        operand: Option<Value>,
    },
    String { op: StringOp, args: Vec<Value> },
    Array { op: ArrayOp, args: Vec<Value> },
    Conditional {
        predicate: Box<Predicate>,
        if_true: Box<Transform>,
        if_false: Box<Transform>,
    },
    Compose { list: Vec<Transform> },
    Construct { fields: Vec<(String, Transform)> },
}

impl Transform {
    pub fn property(path: Vec<String>) -> Result<Self, IocError> {
        if path.is_empty() {
            return Err(IocError::UnsafeValue {
                detail: "Property path must be non-empty".to_string(),
            });
        }
        Ok(Transform::Property { path })
    }

    /// Apply this transform to `x`. Unbounded recursion depth; see
    /// [`Transform::apply_checked`] for the depth-capped entry point the
    /// interpreter actually uses.
    pub fn apply(&self, x: &Value) -> Result<Value, IocError> {
        self.apply_checked(x, "", 0, usize::MAX)
    }

    /// Depth-checked application: raises
    /// `IocError::BudgetExceeded{kind: Stack, ..}` once `depth` exceeds
    /// `max_depth` rather than letting a pathologically nested
    /// `Conditional`/`Compose`/`Construct` tree overflow the native stack.
    pub fn apply_checked(
        &self,
        x: &Value,
        node_id: &str,
        depth: usize,
        max_depth: usize,
    ) -> Result<Value, IocError> {
        if depth > max_depth {
            tracing::warn!(node_id = %node_id, depth, "budget exceeded: stack depth cap");
            return Err(IocError::BudgetExceeded {
                kind: BudgetKind::Stack,
                node_id: node_id.to_string(),
            });
        }
        match self {
            Transform::Identity => Ok(x.clone()),
            Transform::Constant { value } => Ok(value.clone()),
            Transform::Property { path } => {
                let mut current = x.clone();
                for segment in path {
                    current = current.get_field(segment).cloned().unwrap_or(Value::Null);
                }
                Ok(current)
            }
            Transform::Arithmetic { op, operand } => apply_arithmetic(x, *op, operand.as_ref()),
            Transform::String { op, args } => apply_string(x, *op, args),
            Transform::Array { op, args } => apply_array(x, *op, args),
            Transform::Conditional {
                predicate,
                if_true,
                if_false,
            } => {
                if predicate.evaluate_checked(x, node_id, depth + 1, max_depth)? {
                    if_true.apply_checked(x, node_id, depth + 1, max_depth)
                } else {
                    if_false.apply_checked(x, node_id, depth + 1, max_depth)
                }
            }
            Transform::Compose { list } => {
                let mut current = x.clone();
                for t in list {
                    current = t.apply_checked(&current, node_id, depth + 1, max_depth)?;
                }
                Ok(current)
            }
            Transform::Construct { fields } => {
                let mut out = Vec::with_capacity(fields.len());
                for (name, t) in fields {
                    out.push((name.clone(), t.apply_checked(x, node_id, depth + 1, max_depth)?));
                }
                Ok(Value::Object(out))
            }
        }
    }

    /// Deterministic pretty-printing used as the canonical signature input
    /// for CSE (§4.5).
    pub fn canonical_signature(&self) -> String {
        match self {
            Transform::Identity => "id".to_string(),
            Transform::Constant { value } => format!("const({})", value.stringify()),
            Transform::Property { path } => format!("prop({})", path.join(".")),
            Transform::Arithmetic { op, operand } => format!(
                "arith({op:?},{})",
                operand.as_ref().map(Value::stringify).unwrap_or_default()
            ),
            Transform::String { op, args } => {
                let parts: Vec<String> = args.iter().map(Value::stringify).collect();
                format!("str({op:?},[{}])", parts.join(","))
            }
            Transform::Array { op, args } => {
                let parts: Vec<String> = args.iter().map(Value::stringify).collect();
                format!("arr({op:?},[{}])", parts.join(","))
            }
            Transform::Conditional {
                predicate,
                if_true,
                if_false,
            } => format!(
                "cond({},{},{})",
                predicate.canonical_signature(),
                if_true.canonical_signature(),
                if_false.canonical_signature()
            ),
            Transform::Compose { list } => {
                let parts: Vec<String> = list.iter().map(Transform::canonical_signature).collect();
                format!("compose[{}]", parts.join(","))
            }
            Transform::Construct { fields } => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(k, t)| format!("{k}:{}", t.canonical_signature()))
                    .collect();
                format!("construct{{{}}}", parts.join(","))
            }
        }
    }
}

fn as_number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => *n,
        _ => f64::NAN,
    }
}

fn apply_arithmetic(x: &Value, op: ArithmeticOp, operand: Option<&Value>) -> Result<Value, IocError> {
    let a = as_number(x);
    if op == ArithmeticOp::Negate {
        return Ok(Value::Number(-a));
    }
    let b = operand.map(as_number).unwrap_or(0.0);
    // Division by zero yields the platform's non-finite value, per §4.6.
    let result = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide => a / b,
        ArithmeticOp::Modulo => a % b,
        ArithmeticOp::Power => a.powf(b),
        ArithmeticOp::Negate => unreachable!("handled above"),
    };
    Ok(Value::Number(result))
}

fn as_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.stringify(),
    }
}

fn apply_string(x: &Value, op: StringOp, args: &[Value]) -> Result<Value, IocError> {
    let s = as_string(x);
    match op {
        StringOp::Uppercase => Ok(Value::String(s.to_uppercase())),
        StringOp::Lowercase => Ok(Value::String(s.to_lowercase())),
        StringOp::Trim => Ok(Value::String(s.trim().to_string())),
        StringOp::Concat => {
            let mut out = s;
            for a in args {
                out.push_str(&as_string(a));
            }
            Ok(Value::String(out))
        }
        StringOp::Substring => {
            let start = args.first().map(as_number).unwrap_or(0.0).max(0.0) as usize;
            let end = args
                .get(1)
                .map(as_number)
                .map(|n| n.max(0.0) as usize)
                .unwrap_or(s.chars().count());
            let chars: Vec<char> = s.chars().collect();
            let start = start.min(chars.len());
            let end = end.min(chars.len()).max(start);
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        StringOp::Split => {
            let sep = args.first().map(as_string).unwrap_or_default();
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect()
            };
            Ok(Value::Array(parts))
        }
        StringOp::Replace => {
            let from = args.first().map(as_string).unwrap_or_default();
            let to = args.get(1).map(as_string).unwrap_or_default();
            Ok(Value::String(s.replace(from.as_str(), &to)))
        }
    }
}

fn apply_array(x: &Value, op: ArrayOp, args: &[Value]) -> Result<Value, IocError> {
    let items: Vec<Value> = match x {
        Value::Array(items) => items.clone(),
        _ => Vec::new(),
    };
    match op {
        ArrayOp::Length => Ok(Value::Number(items.len() as f64)),
        ArrayOp::Reverse => {
            let mut r = items;
            r.reverse();
            Ok(Value::Array(r))
        }
        ArrayOp::Slice => {
            let start = args.first().map(as_number).unwrap_or(0.0).max(0.0) as usize;
            let end = args
                .get(1)
                .map(as_number)
                .map(|n| n.max(0.0) as usize)
                .unwrap_or(items.len());
            let start = start.min(items.len());
            let end = end.min(items.len()).max(start);
            Ok(Value::Array(items[start..end].to_vec()))
        }
        ArrayOp::Concat => {
            let mut out = items;
            for a in args {
                if let Value::Array(more) = a {
                    out.extend(more.clone());
                }
            }
            Ok(Value::Array(out))
        }
        ArrayOp::At => {
            let idx = args.first().map(as_number).unwrap_or(0.0) as i64;
            let idx = if idx < 0 {
                items.len() as i64 + idx
            } else {
                idx
            };
            if idx < 0 || idx as usize >= items.len() {
                Ok(Value::Null)
            } else {
                Ok(items[idx as usize].clone())
            }
        }
    }
}

/// Pre-validate every regex literal reachable from a `matches` predicate
/// nested inside this transform's `Conditional` branches, so the code
/// generator can fail fast before lowering. Exposed for the security
/// validator and code generator to share.
pub fn validate_nested_regexes(t: &Transform) -> Result<(), IocError> {
    match t {
        Transform::Conditional {
            predicate,
            if_true,
            if_false,
        } => {
            validate_predicate_regexes(predicate)?;
            validate_nested_regexes(if_true)?;
            validate_nested_regexes(if_false)
        }
        Transform::Compose { list } => {
            for inner in list {
                validate_nested_regexes(inner)?;
            }
            Ok(())
        }
        Transform::Construct { fields } => {
            for (_, inner) in fields {
                validate_nested_regexes(inner)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_predicate_regexes(p: &Predicate) -> Result<(), IocError> {
    match p {
        Predicate::Compare {
            op: super::predicate::CompareOp::Matches,
            literal: Value::String(pattern),
        } => compile_validated_regex(pattern).map(|_| ()),
        Predicate::And { list } | Predicate::Or { list } => {
            for inner in list {
                validate_predicate_regexes(inner)?;
            }
            Ok(())
        }
        Predicate::Not { inner } => validate_predicate_regexes(inner),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divide_by_zero_yields_infinity() {
        let t = Transform::Arithmetic {
            op: ArithmeticOp::Divide,
            operand: Some(Value::Number(0.0)),
        };
        match t.apply(&Value::Number(5.0)).unwrap() {
            Value::Number(n) => assert!(n.is_infinite()),
            _ => panic!("expected number"),
        }
    }

    #[test]
    fn negative_index_at_wraps() {
        let t = Transform::Array {
            op: ArrayOp::At,
            args: vec![Value::Number(-1.0)],
        };
        let x = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert!(matches!(t.apply(&x).unwrap(), Value::Number(n) if n == 2.0));
    }

    #[test]
    fn compose_chains_left_to_right() {
        let t = Transform::Compose {
            list: vec![
                Transform::Arithmetic {
                    op: ArithmeticOp::Add,
                    operand: Some(Value::Number(1.0)),
                },
                Transform::Arithmetic {
                    op: ArithmeticOp::Multiply,
                    operand: Some(Value::Number(2.0)),
                },
            ],
        };
        let result = t.apply(&Value::Number(3.0)).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 8.0));
    }

    #[test]
    fn property_path_missing_segment_yields_null() {
        let t = Transform::property(vec!["a".to_string(), "b".to_string()]).unwrap();
        let x = Value::Object(vec![("a".to_string(), Value::Object(vec![]))]);
        assert!(matches!(t.apply(&x).unwrap(), Value::Null));
    }
}
