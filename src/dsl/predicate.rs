//! Boolean-valued expressions over a single implicit argument `x`.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BudgetKind, IocError};
use crate::security;
use crate::value::{Value, ValueKind};

/// Comparison operator used by `Compare` and `CompareProperty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
    Matches,
}

/// A boolean-valued expression over a single implicit argument `x`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Predicate {
    /// Compare `x` itself against a literal.
    Compare { op: CompareOp, literal: Value },
    /// Dereference `x.identifier` then compare against a literal.
    CompareProperty {
        op: CompareOp,
        identifier: String,
        literal: Value,
    },
    /// Check the coarse kind of `x`.
    TypeCheck { kind: ValueKind },
    And { list: Vec<Predicate> },
    Or { list: Vec<Predicate> },
    Not { inner: Box<Predicate> },
    Always { value: bool },
}

impl Predicate {
    /// Evaluate this predicate against `x`. Property paths and regex
    /// literals must already have passed [`crate::security::validate_predicate`]
    /// — this function does not re-check them for performance, matching the
    /// code generator's "validate once, at the boundary" discipline.
    ///
    /// Unbounded recursion depth; callers outside the interpreter (tests,
    /// the optimizer's structural analysis) have no node to attribute a
    /// stack-budget breach to. [`Predicate::evaluate_checked`] is the
    /// depth-capped entry point the interpreter actually uses.
    pub fn evaluate(&self, x: &Value) -> Result<bool, IocError> {
        self.evaluate_checked(x, "", 0, usize::MAX)
    }

    /// Depth-checked evaluation: raises
    /// `IocError::BudgetExceeded{kind: Stack, ..}` once `depth` exceeds
    /// `max_depth` rather than letting a pathologically nested `And`/`Or`/
    /// `Not` tree overflow the native stack. `node_id` is attached to the
    /// error for diagnostics; `depth` is the caller's nesting level, not
    /// this predicate's own.
    pub fn evaluate_checked(
        &self,
        x: &Value,
        node_id: &str,
        depth: usize,
        max_depth: usize,
    ) -> Result<bool, IocError> {
        if depth > max_depth {
            tracing::warn!(node_id = %node_id, depth, "budget exceeded: stack depth cap");
            return Err(IocError::BudgetExceeded {
                kind: BudgetKind::Stack,
                node_id: node_id.to_string(),
            });
        }
        match self {
            Predicate::Compare { op, literal } => compare(x, *op, literal),
            Predicate::CompareProperty {
                op,
                identifier,
                literal,
            } => {
                let field = x.get_field(identifier).cloned().unwrap_or(Value::Null);
                compare(&field, *op, literal)
            }
            Predicate::TypeCheck { kind } => Ok(x.kind() == *kind),
            Predicate::And { list } => {
                for p in list {
                    if !p.evaluate_checked(x, node_id, depth + 1, max_depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or { list } => {
                for p in list {
                    if p.evaluate_checked(x, node_id, depth + 1, max_depth)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not { inner } => Ok(!inner.evaluate_checked(x, node_id, depth + 1, max_depth)?),
            Predicate::Always { value } => Ok(*value),
        }
    }

    /// Deterministic pretty-printing used as the canonical signature input
    /// for CSE — two structurally equal predicates always render
    /// identically. Commutative-operand reordering is *not* assumed here;
    /// `And`/`Or` operand order is part of the signature. The CSE pass's
    /// own sorting of node *inputs* is a separate concern handled at the
    /// call site, not here.
    pub fn canonical_signature(&self) -> String {
        match self {
            Predicate::Compare { op, literal } => {
                format!("cmp({op:?},{})", literal.stringify())
            }
            Predicate::CompareProperty {
                op,
                identifier,
                literal,
            } => format!("cmpprop({op:?},{identifier},{})", literal.stringify()),
            Predicate::TypeCheck { kind } => format!("typecheck({kind})"),
            Predicate::And { list } => {
                let parts: Vec<String> = list.iter().map(Predicate::canonical_signature).collect();
                format!("and[{}]", parts.join(","))
            }
            Predicate::Or { list } => {
                let parts: Vec<String> = list.iter().map(Predicate::canonical_signature).collect();
                format!("or[{}]", parts.join(","))
            }
            Predicate::Not { inner } => format!("not({})", inner.canonical_signature()),
            Predicate::Always { value } => format!("always({value})"),
        }
    }
}

fn compare(x: &Value, op: CompareOp, literal: &Value) -> Result<bool, IocError> {
    match op {
        CompareOp::Eq => Ok(x.structural_eq(literal)),
        CompareOp::Ne => Ok(!x.structural_eq(literal)),
        CompareOp::Gt => Ok(numeric_cmp(x, literal)? == std::cmp::Ordering::Greater),
        CompareOp::Gte => Ok(numeric_cmp(x, literal)? != std::cmp::Ordering::Less),
        CompareOp::Lt => Ok(numeric_cmp(x, literal)? == std::cmp::Ordering::Less),
        CompareOp::Lte => Ok(numeric_cmp(x, literal)? != std::cmp::Ordering::Greater),
        CompareOp::In => match literal {
            Value::Array(items) => Ok(items.iter().any(|i| i.structural_eq(x))),
            _ => Ok(false),
        },
        CompareOp::Contains => match x {
            Value::Array(items) => Ok(items.iter().any(|i| i.structural_eq(literal))),
            Value::String(s) => match literal {
                Value::String(needle) => Ok(s.contains(needle.as_str())),
                _ => Ok(false),
            },
            _ => Ok(false),
        },
        CompareOp::Matches => {
            let (Value::String(s), Value::String(pattern)) = (x, literal) else {
                return Ok(false);
            };
            let re = compile_validated_regex(pattern)?;
            Ok(re.is_match(s))
        }
    }
}

fn numeric_cmp(a: &Value, b: &Value) -> Result<std::cmp::Ordering, IocError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).ok_or_else(|| IocError::UnsafeValue {
            detail: "cannot order NaN".to_string(),
        }),
        _ => Ok(a.lexicographic_cmp(b)),
    }
}

/// Compile a regex literal after re-confirming it passes the invariant-6
/// shape guard. Compilation is cached per call site by the caller where it
/// matters (the code generator pre-validates once at lowering time).
pub fn compile_validated_regex(pattern: &str) -> Result<Regex, IocError> {
    security::validate_regex_literal(pattern)?;
    Regex::new(pattern).map_err(|e| IocError::UnsafeValue {
        detail: format!("invalid regex literal: {e}"),
    })
}
