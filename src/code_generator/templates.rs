//! Per-intent expression templates.
//!
//! Lowers a single [`IntentNode`] to a line of the host expression grammar
//! — a small, side-effect-free text form used purely for the generated
//! code size/shape checks in [`crate::security`] and for diagnostics. The
//! values the program actually computes come from
//! [`crate::execution::interpreter`], not from parsing this text back.

use crate::dsl::{Predicate, Transform};
use crate::error::IocError;
use crate::ir::{IntentKind, IntentNode};
use crate::security::{escape_string_literal, sanitize_identifier};
use crate::value::Value;

fn lower_value(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{}\"", escape_string_literal(s)),
        other => other.stringify(),
    }
}

fn lower_predicate(p: &Predicate) -> String {
    match p {
        Predicate::Compare { op, literal } => format!("(x {op:?} {})", lower_value(literal)),
        Predicate::CompareProperty { op, identifier, literal } => {
            format!("(x.{} {op:?} {})", sanitize_identifier(identifier), lower_value(literal))
        }
        Predicate::TypeCheck { kind } => format!("(typeof(x) == {kind})"),
        Predicate::And { list } => {
            let parts: Vec<String> = list.iter().map(lower_predicate).collect();
            format!("({})", parts.join(" && "))
        }
        Predicate::Or { list } => {
            let parts: Vec<String> = list.iter().map(lower_predicate).collect();
            format!("({})", parts.join(" || "))
        }
        Predicate::Not { inner } => format!("!({})", lower_predicate(inner)),
        Predicate::Always { value } => value.to_string(),
    }
}

fn lower_transform(t: &Transform) -> String {
    match t {
        Transform::Identity => "x".to_string(),
        Transform::Constant { value } => lower_value(value),
        Transform::Property { path } => {
            let segments: Vec<String> = path.iter().map(|s| sanitize_identifier(s)).collect();
            format!("x.{}", segments.join("."))
        }
        Transform::Arithmetic { op, operand } => format!(
            "({op:?} x {})",
            operand.as_ref().map(lower_value).unwrap_or_default()
        ),
        Transform::String { op, args } => {
            let parts: Vec<String> = args.iter().map(lower_value).collect();
            format!("str_{op:?}(x, [{}])", parts.join(", "))
        }
        Transform::Array { op, args } => {
            let parts: Vec<String> = args.iter().map(lower_value).collect();
            format!("arr_{op:?}(x, [{}])", parts.join(", "))
        }
        Transform::Conditional {
            predicate,
            if_true,
            if_false,
        } => format!(
            "(if {} then {} else {})",
            lower_predicate(predicate),
            lower_transform(if_true),
            lower_transform(if_false)
        ),
        Transform::Compose { list } => {
            let parts: Vec<String> = list.iter().map(lower_transform).collect();
            parts.join(" |> ")
        }
        Transform::Construct { fields } => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(name, t)| format!("{}: {}", sanitize_identifier(name), lower_transform(t)))
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
    }
}

/// Lower one node to a single line of source, e.g.
/// `let n3 = filter(n2, (x.age > 0));`.
pub fn lower_node(node: &IntentNode) -> Result<String, IocError> {
    let id = sanitize_identifier(&node.id);
    let inputs: Vec<String> = node.inputs.iter().map(|i| sanitize_identifier(i)).collect();

    let rhs = match &node.kind {
        IntentKind::Input { name, .. } => format!("input(\"{}\")", escape_string_literal(name)),
        IntentKind::Constant { value } => format!("const({})", lower_value(value)),
        IntentKind::Filter { predicate } => format!("filter({}, {})", inputs[0], lower_predicate(predicate)),
        IntentKind::Map { transform } => format!("map({}, {})", inputs[0], lower_transform(transform)),
        IntentKind::Reduce { reduction, .. } => format!("reduce({}, {})", inputs[0], reduction.canonical_signature()),
        IntentKind::Sort { descending, .. } => format!("sort({}, desc={descending})", inputs[0]),
        IntentKind::Distinct { .. } => format!("distinct({})", inputs[0]),
        IntentKind::Flatten { depth } => format!("flatten({}, depth={depth})", inputs[0]),
        IntentKind::GroupBy { key_transform } => {
            format!("groupBy({}, {})", inputs[0], lower_transform(key_transform))
        }
        IntentKind::Join { join_type, .. } => format!("join({}, {}, {join_type:?})", inputs[0], inputs[1]),
        IntentKind::Slice { start, end } => format!("slice({}, {start:?}, {end:?})", inputs[0]),
        IntentKind::Concat => format!("concat([{}])", inputs.join(", ")),
        IntentKind::Output => format!("output({})", inputs[0]),
    };

    Ok(format!("let {id} = {rhs};"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::CompareOp;
    use crate::ir::IntentNode;

    #[test]
    fn lowers_a_filter_node_to_one_line() {
        let node = IntentNode::new(
            "f1",
            IntentKind::Filter {
                predicate: Predicate::Compare {
                    op: CompareOp::Gt,
                    literal: Value::Number(0.0),
                },
            },
            vec!["in".to_string()],
        );
        let source = lower_node(&node).unwrap();
        assert!(source.starts_with("let f1 = filter(in,"));
    }

    #[test]
    fn property_path_segments_are_sanitized() {
        let t = Transform::Property {
            path: vec!["a.b".to_string()],
        };
        assert_eq!(lower_transform(&t), "x.a_b");
    }
}
