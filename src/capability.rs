//! # Capability Calculus
//!
//! Deterministic, compositional derivation of the safety/performance facts
//! attached to every intent node: complexity class, termination guarantee,
//! purity, parallelizability, and memory bound.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::dsl::{Predicate, Transform};
use crate::ir::IntentKind;

/// Asymptotic complexity class, ordered per §4.2's enumeration index:
/// constant < log < linear < linearithmic < quadratic < cubic < exponential
/// < factorial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplexityClass {
    Constant,
    Logarithmic,
    Linear,
    Linearithmic,
    Quadratic,
    Cubic,
    Exponential,
    Factorial,
}

impl ComplexityClass {
    fn rank(self) -> u8 {
        match self {
            ComplexityClass::Constant => 0,
            ComplexityClass::Logarithmic => 1,
            ComplexityClass::Linear => 2,
            ComplexityClass::Linearithmic => 3,
            ComplexityClass::Quadratic => 4,
            ComplexityClass::Cubic => 5,
            ComplexityClass::Exponential => 6,
            ComplexityClass::Factorial => 7,
        }
    }

    /// The coarser of two complexity classes.
    pub fn join(self, other: ComplexityClass) -> ComplexityClass {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }
}

impl PartialOrd for ComplexityClass {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.rank().cmp(&other.rank()))
    }
}

impl Ord for ComplexityClass {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComplexityClass::Constant => "O(1)",
            ComplexityClass::Logarithmic => "O(log n)",
            ComplexityClass::Linear => "O(n)",
            ComplexityClass::Linearithmic => "O(n log n)",
            ComplexityClass::Quadratic => "O(n²)",
            ComplexityClass::Cubic => "O(n³)",
            ComplexityClass::Exponential => "O(2ⁿ)",
            ComplexityClass::Factorial => "O(n!)",
        };
        write!(f, "{s}")
    }
}

/// How termination of a node is known to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationGuarantee {
    /// Primitive-recursive over finite inputs; terminates by construction.
    Structural,
    /// Termination follows from a declared upper bound (e.g. sorting).
    Bounded,
    /// Reserved for future user code; unreachable in the SIR today.
    Empirical,
}

/// The full capability record attached to every intent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub max_complexity: ComplexityClass,
    pub termination_guarantee: TerminationGuarantee,
    /// Every intent in the closed algebra is pure; kept as a named field
    /// rather than omitted so generated code and diagnostics can quote it.
    pub side_effects_pure: bool,
    pub parallelizable: bool,
    pub memory_bound: ComplexityClass,
}

impl Capability {
    const fn pure(
        max_complexity: ComplexityClass,
        termination_guarantee: TerminationGuarantee,
        parallelizable: bool,
        memory_bound: ComplexityClass,
    ) -> Self {
        Capability {
            max_complexity,
            termination_guarantee,
            side_effects_pure: true,
            parallelizable,
            memory_bound,
        }
    }

    /// Whether `self` is at least as restrictive (safe) as `other` — used
    /// by callers that want to check a re-derived capability against a
    /// previously declared one without requiring bit-for-bit equality of
    /// every field (invariant 3 itself does require exact structural
    /// equality; `dominates` is for advisory comparisons, e.g. choosing a
    /// conservative default in the absence of a declared capability).
    pub fn dominates(&self, other: &Capability) -> bool {
        self.max_complexity >= other.max_complexity && self.memory_bound >= other.memory_bound
    }
}

/// Complexity of a predicate expression, per §4.2.
pub fn predicate_complexity(p: &Predicate) -> ComplexityClass {
    match p {
        Predicate::Compare { .. } | Predicate::CompareProperty { .. } | Predicate::TypeCheck { .. } | Predicate::Always { .. } => {
            ComplexityClass::Constant
        }
        Predicate::Not { inner } => predicate_complexity(inner),
        Predicate::And { list } | Predicate::Or { list } => list
            .iter()
            .map(predicate_complexity)
            .fold(ComplexityClass::Constant, ComplexityClass::join),
    }
}

/// Complexity of a transform expression, per §4.2. String ops are O(n) in
/// the length of their string arguments; the capability calculus records
/// only the class, not the concrete `n`, so the worst case for `op` is used
/// uniformly.
pub fn transform_complexity(t: &Transform) -> ComplexityClass {
    match t {
        Transform::Identity | Transform::Constant { .. } | Transform::Property { .. } | Transform::Arithmetic { .. } => {
            ComplexityClass::Constant
        }
        Transform::String { .. } => ComplexityClass::Linear,
        Transform::Array { op, .. } => match op {
            crate::dsl::ArrayOp::Length => ComplexityClass::Constant,
            _ => ComplexityClass::Linear,
        },
        Transform::Conditional {
            predicate,
            if_true,
            if_false,
        } => predicate_complexity(predicate)
            .join(transform_complexity(if_true))
            .join(transform_complexity(if_false)),
        Transform::Compose { list } => list
            .iter()
            .map(transform_complexity)
            .fold(ComplexityClass::Constant, ComplexityClass::join),
        Transform::Construct { fields } => fields
            .iter()
            .map(|(_, t)| transform_complexity(t))
            .fold(ComplexityClass::Constant, ComplexityClass::join),
    }
}

/// Derive the full capability record for an intent kind and its params, per
/// §4.2's abridged rule table. This is the single source of truth; `IrProgram`
/// invariant 3 requires every node's declared capability to equal what this
/// function returns for that node's kind and params.
pub fn derive_capability(kind: &IntentKind) -> Capability {
    use ComplexityClass::{Constant, Linear, Linearithmic, Quadratic};
    use TerminationGuarantee::{Bounded, Structural};

    match kind {
        IntentKind::Input { .. } | IntentKind::Constant { .. } | IntentKind::Output => {
            Capability::pure(Constant, Structural, true, Constant)
        }
        IntentKind::Filter { predicate } => {
            Capability::pure(predicate_complexity(predicate), Structural, true, Linear)
        }
        IntentKind::Map { transform } => {
            Capability::pure(transform_complexity(transform), Structural, true, Linear)
        }
        IntentKind::Reduce { .. } => Capability::pure(Linear, Structural, false, Constant),
        IntentKind::Sort { .. } => Capability::pure(Linearithmic, Bounded, false, Linear),
        IntentKind::Distinct { .. } | IntentKind::Flatten { .. } | IntentKind::Slice { .. } | IntentKind::Concat => {
            Capability::pure(Linear, Structural, true, Linear)
        }
        IntentKind::GroupBy { .. } => Capability::pure(Linear, Structural, false, Linear),
        IntentKind::Join { .. } => Capability::pure(Quadratic, Structural, false, Quadratic),
    }
}
