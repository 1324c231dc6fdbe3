//! # IR Program
//!
//! The DAG of intent nodes: topological ordering, cycle detection, and
//! structural validation. This is the canonical IR definition used by the
//! optimizer (C6), code generator (C7), and provenance tracker (C10).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::{derive_capability, Capability};
use crate::dsl::{Predicate, Reduction, Transform};
use crate::value::{Value, ValueKind};

/// How a `Join` intent combines its two inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
}

fn default_flatten_depth() -> usize {
    1
}

/// The kind-specific params of an intent node, adjacently tagged as
/// `{"type": "...", "params": {...}}` in the serialized form (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum IntentKind {
    Input {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        type_hint: Option<ValueKind>,
    },
    Constant {
        value: Value,
    },
    Filter {
        predicate: Predicate,
    },
    Map {
        transform: Transform,
    },
    Reduce {
        reduction: Reduction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial: Option<Value>,
    },
    Sort {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_transform: Option<Transform>,
        #[serde(default)]
        descending: bool,
    },
    Distinct {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_transform: Option<Transform>,
    },
    Flatten {
        #[serde(default = "default_flatten_depth")]
        depth: usize,
    },
    GroupBy {
        key_transform: Transform,
    },
    Join {
        left_key: Transform,
        right_key: Transform,
        join_type: JoinType,
    },
    Slice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<i64>,
    },
    Concat,
    Output,
}

impl IntentKind {
    /// Short tag matching the `type` discriminant, used in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            IntentKind::Input { .. } => "Input",
            IntentKind::Constant { .. } => "Constant",
            IntentKind::Filter { .. } => "Filter",
            IntentKind::Map { .. } => "Map",
            IntentKind::Reduce { .. } => "Reduce",
            IntentKind::Sort { .. } => "Sort",
            IntentKind::Distinct { .. } => "Distinct",
            IntentKind::Flatten { .. } => "Flatten",
            IntentKind::GroupBy { .. } => "GroupBy",
            IntentKind::Join { .. } => "Join",
            IntentKind::Slice { .. } => "Slice",
            IntentKind::Concat => "Concat",
            IntentKind::Output => "Output",
        }
    }

    /// Deterministic signature used by common subexpression elimination.
    /// Two nodes with equal signatures AND equal `inputs` compute the same
    /// value; operand order is part of the signature, so no commutative
    /// reordering is assumed anywhere in this string.
    pub fn canonical_signature(&self) -> String {
        match self {
            IntentKind::Input { name, type_hint } => {
                format!("input({name},{type_hint:?})")
            }
            IntentKind::Constant { value } => format!("constant({})", value.stringify()),
            IntentKind::Filter { predicate } => format!("filter({})", predicate.canonical_signature()),
            IntentKind::Map { transform } => format!("map({})", transform.canonical_signature()),
            IntentKind::Reduce { reduction, initial } => format!(
                "reduce({},{})",
                reduction.canonical_signature(),
                initial.as_ref().map(Value::stringify).unwrap_or_default()
            ),
            IntentKind::Sort {
                key_transform,
                descending,
            } => format!(
                "sort({},{descending})",
                key_transform.as_ref().map(Transform::canonical_signature).unwrap_or_default()
            ),
            IntentKind::Distinct { key_transform } => format!(
                "distinct({})",
                key_transform.as_ref().map(Transform::canonical_signature).unwrap_or_default()
            ),
            IntentKind::Flatten { depth } => format!("flatten({depth})"),
            IntentKind::GroupBy { key_transform } => {
                format!("groupBy({})", key_transform.canonical_signature())
            }
            IntentKind::Join {
                left_key,
                right_key,
                join_type,
            } => format!(
                "join({},{},{join_type:?})",
                left_key.canonical_signature(),
                right_key.canonical_signature()
            ),
            IntentKind::Slice { start, end } => format!("slice({start:?},{end:?})"),
            IntentKind::Concat => "concat".to_string(),
            IntentKind::Output => "output".to_string(),
        }
    }
}

/// One node in the program DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: IntentKind,
    pub inputs: Vec<String>,
    pub capability: Capability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl IntentNode {
    /// Construct a node with its capability derived automatically from
    /// `kind`, matching invariant 3 by construction. Programs built any
    /// other way (e.g. deserialized from untrusted bytes) must still pass
    /// through [`crate::ir::IrProgram::validate`], which re-checks this.
    pub fn new(id: impl Into<String>, kind: IntentKind, inputs: Vec<String>) -> Self {
        let capability = derive_capability(&kind);
        IntentNode {
            id: id.into(),
            kind,
            inputs,
            capability,
            metadata: None,
        }
    }
}

/// Free-form program metadata, all optional per §6.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    None,
    Basic,
    Aggressive,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization_level: Option<OptimizationLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// A program: the DAG of intent nodes plus its declared outputs. Immutable
/// once constructed — the optimizer produces a new `Program`, it never
/// mutates one in place (§3 lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub version: String,
    #[serde(default)]
    pub metadata: ProgramMetadata,
    pub nodes: Vec<IntentNode>,
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ProgramOptions>,
}

/// One structural validation failure, per the enumeration in §4.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingOutputReference { output_id: String },
    MissingInputReference { node_id: String, input_id: String },
    Cycle,
    CapabilityMismatch {
        node_id: String,
        declared: Capability,
        derived: Capability,
    },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::MissingOutputReference { output_id } => {
                write!(f, "output references unknown node '{output_id}'")
            }
            ValidationIssue::MissingInputReference { node_id, input_id } => {
                write!(f, "node '{node_id}' references unknown input '{input_id}'")
            }
            ValidationIssue::Cycle => write!(f, "program contains a cycle in the inputs relation"),
            ValidationIssue::CapabilityMismatch { node_id, declared, derived } => write!(
                f,
                "node '{node_id}' declares capability {:?} but derivation yields {:?}",
                declared, derived
            ),
        }
    }
}

/// The result of [`IrProgram::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Operations over a [`Program`] treated purely as a DAG: lookup, ordering,
/// cycle detection, and structural validation.
pub struct IrProgram<'a> {
    program: &'a Program,
    index: HashMap<&'a str, &'a IntentNode>,
}

impl<'a> IrProgram<'a> {
    pub fn new(program: &'a Program) -> Self {
        let index = program.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        IrProgram { program, index }
    }

    pub fn node(&self, id: &str) -> Option<&'a IntentNode> {
        self.index.get(id).copied()
    }

    pub fn program(&self) -> &'a Program {
        self.program
    }

    /// Topological order by DFS from outputs, visiting dependencies first,
    /// returning ids in post-order. Deterministic: inputs are visited in
    /// their declared order, so two identical programs yield identical
    /// orders (§4.3, testable property 1).
    ///
    /// Node references that cannot be resolved are treated as missing edges
    /// and silently skipped here — `validate` is what reports them; a
    /// caller that skips validation and calls this directly on a malformed
    /// program gets a best-effort order over the resolvable subgraph.
    pub fn execution_order(&self) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for output in &self.program.outputs {
            self.visit_post_order(output, &mut visited, &mut order);
        }
        order
    }

    fn visit_post_order(&self, id: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        if visited.contains(id) {
            return;
        }
        let Some(node) = self.node(id) else {
            return;
        };
        visited.insert(id.to_string());
        for input in &node.inputs {
            self.visit_post_order(input, visited, order);
        }
        order.push(id.to_string());
    }

    /// DFS with a recursion stack; returns `true` on a back-edge.
    pub fn detect_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        for node in &self.program.nodes {
            if !visited.contains(node.id.as_str())
                && self.dfs_has_cycle(&node.id, &mut visited, &mut on_stack)
            {
                return true;
            }
        }
        false
    }

    fn dfs_has_cycle(&self, id: &str, visited: &mut HashSet<String>, on_stack: &mut HashSet<String>) -> bool {
        visited.insert(id.to_string());
        on_stack.insert(id.to_string());
        if let Some(node) = self.node(id) {
            for input in &node.inputs {
                if on_stack.contains(input) {
                    return true;
                }
                if !visited.contains(input.as_str()) && self.dfs_has_cycle(input, visited, on_stack) {
                    return true;
                }
            }
        }
        on_stack.remove(id);
        false
    }

    /// Structural validation per §4.3: missing output reference, missing
    /// input reference, cycle, and capability mismatch (invariant 3).
    /// Invariants 4–7 (legal values, property-path shape, regex shape,
    /// size caps) are the security validator's job (C5), applied at
    /// deserialization and compilation boundaries.
    pub fn validate(&self) -> ValidationReport {
        let mut issues = Vec::new();

        for output_id in &self.program.outputs {
            if self.node(output_id).is_none() {
                issues.push(ValidationIssue::MissingOutputReference {
                    output_id: output_id.clone(),
                });
            }
        }

        for node in &self.program.nodes {
            for input_id in &node.inputs {
                if self.node(input_id).is_none() {
                    issues.push(ValidationIssue::MissingInputReference {
                        node_id: node.id.clone(),
                        input_id: input_id.clone(),
                    });
                }
            }
        }

        if self.detect_cycle() {
            issues.push(ValidationIssue::Cycle);
        }

        for node in &self.program.nodes {
            let derived = derive_capability(&node.kind);
            if derived != node.capability {
                issues.push(ValidationIssue::CapabilityMismatch {
                    node_id: node.id.clone(),
                    declared: node.capability,
                    derived,
                });
            }
        }

        ValidationReport { issues }
    }
}

impl Program {
    /// Parse a program from already-in-memory JSON bytes. This is the
    /// serialization *port* itself — a pure byte-to-struct function, not
    /// file or network I/O, which remains an external collaborator's job.
    /// The caller is expected to run [`crate::security::validate_program`]
    /// before trusting the result; this function only does `serde`'s
    /// structural parsing.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Program, crate::error::IocError> {
        serde_json::from_slice(bytes).map_err(|e| crate::error::IocError::InvalidProgram {
            reasons: vec![format!("JSON parse error: {e}")],
        })
    }

    /// Serialize to JSON bytes. Round-trips unknown fields verbatim because
    /// every struct in this module derives `Serialize`/`Deserialize`
    /// symmetrically and node `metadata` is carried as an opaque
    /// `serde_json::Value`.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, crate::error::IocError> {
        serde_json::to_vec(self).map_err(|e| crate::error::IocError::InvalidProgram {
            reasons: vec![format!("JSON serialize error: {e}")],
        })
    }

    pub fn ir(&self) -> IrProgram<'_> {
        IrProgram::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{CompareOp, Predicate};

    fn scan(id: &str) -> IntentNode {
        IntentNode::new(id, IntentKind::Input { name: id.to_string(), type_hint: None }, vec![])
    }

    #[test]
    fn execution_order_is_topological_and_deterministic() {
        let nodes = vec![
            scan("a"),
            IntentNode::new(
                "b",
                IntentKind::Filter {
                    predicate: Predicate::Always { value: true },
                },
                vec!["a".to_string()],
            ),
            IntentNode::new("c", IntentKind::Output, vec!["b".to_string()]),
        ];
        let program = Program {
            version: "1.0".to_string(),
            metadata: ProgramMetadata::default(),
            nodes,
            outputs: vec!["c".to_string()],
            options: None,
        };
        let order = program.ir().execution_order();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn detects_cycle() {
        let nodes = vec![
            IntentNode::new("a", IntentKind::Output, vec!["b".to_string()]),
            IntentNode::new("b", IntentKind::Output, vec!["a".to_string()]),
        ];
        let program = Program {
            version: "1.0".to_string(),
            metadata: ProgramMetadata::default(),
            nodes,
            outputs: vec!["a".to_string()],
            options: None,
        };
        assert!(program.ir().detect_cycle());
        let report = program.ir().validate();
        assert!(report.issues.contains(&ValidationIssue::Cycle));
    }

    #[test]
    fn missing_references_reported() {
        let program = Program {
            version: "1.0".to_string(),
            metadata: ProgramMetadata::default(),
            nodes: vec![IntentNode::new("a", IntentKind::Output, vec!["ghost".to_string()])],
            outputs: vec!["missing".to_string()],
            options: None,
        };
        let report = program.ir().validate();
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::MissingOutputReference { .. })));
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::MissingInputReference { .. })));
    }

    #[test]
    fn capability_mismatch_detected() {
        let mut node = scan("a");
        node.capability.max_complexity = crate::capability::ComplexityClass::Quadratic;
        let program = Program {
            version: "1.0".to_string(),
            metadata: ProgramMetadata::default(),
            nodes: vec![node],
            outputs: vec![],
            options: None,
        };
        let report = program.ir().validate();
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::CapabilityMismatch { .. })));
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let program = Program {
            version: "1.0".to_string(),
            metadata: ProgramMetadata {
                name: Some("demo".to_string()),
                ..Default::default()
            },
            nodes: vec![scan("a")],
            outputs: vec!["a".to_string()],
            options: None,
        };
        let bytes = program.to_json_bytes().unwrap();
        let parsed = Program::from_json_bytes(&bytes).unwrap();
        assert_eq!(parsed.nodes.len(), 1);
        assert_eq!(parsed.metadata.name.as_deref(), Some("demo"));
    }

    #[test]
    fn compare_op_round_trips() {
        // exercises the DSL's serde tagging through a full node
        let node = IntentNode::new(
            "f",
            IntentKind::Filter {
                predicate: Predicate::Compare {
                    op: CompareOp::Gt,
                    literal: crate::value::Value::Number(10.0),
                },
            },
            vec!["a".to_string()],
        );
        let json = serde_json::to_string(&node).unwrap();
        let back: IntentNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "f");
    }
}
