//! Dead code elimination: drop nodes unreachable from the program's
//! declared outputs.

use std::collections::HashSet;

use super::RewriteOutcome;
use crate::ir::Program;

pub(super) fn run(program: &mut Program) -> Vec<RewriteOutcome> {
    let mut reachable: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = program.outputs.clone();
    let index: std::collections::HashMap<&str, &crate::ir::IntentNode> =
        program.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    while let Some(id) = stack.pop() {
        if !reachable.insert(id.clone()) {
            continue;
        }
        if let Some(node) = index.get(id.as_str()) {
            for input in &node.inputs {
                if !reachable.contains(input) {
                    stack.push(input.clone());
                }
            }
        }
    }

    let dropped: Vec<String> = program
        .nodes
        .iter()
        .filter(|n| !reachable.contains(&n.id))
        .map(|n| n.id.clone())
        .collect();

    if dropped.is_empty() {
        return Vec::new();
    }

    program.nodes.retain(|n| reachable.contains(&n.id));

    vec![RewriteOutcome {
        pass: "dead_code_elimination",
        description: format!("removed {} node(s) unreachable from outputs", dropped.len()),
        original_nodes: dropped,
        result_node: None,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IntentKind;
    use crate::value::Value;

    #[test]
    fn removes_node_with_no_path_to_an_output() {
        let mut program = Program {
            version: "1.0".to_string(),
            metadata: Default::default(),
            nodes: vec![
                crate::ir::IntentNode::new(
                    "a",
                    IntentKind::Constant {
                        value: Value::Number(1.0),
                    },
                    vec![],
                ),
                crate::ir::IntentNode::new("b", IntentKind::Output, vec!["a".to_string()]),
                crate::ir::IntentNode::new(
                    "orphan",
                    IntentKind::Constant {
                        value: Value::Number(2.0),
                    },
                    vec![],
                ),
            ],
            outputs: vec!["b".to_string()],
            options: None,
        };
        let outcome = run(&mut program);
        assert_eq!(outcome.len(), 1);
        assert!(!program.nodes.iter().any(|n| n.id == "orphan"));
    }

    #[test]
    fn no_op_when_everything_is_reachable() {
        let mut program = Program {
            version: "1.0".to_string(),
            metadata: Default::default(),
            nodes: vec![crate::ir::IntentNode::new(
                "a",
                IntentKind::Output,
                vec![],
            )],
            outputs: vec!["a".to_string()],
            options: None,
        };
        assert!(run(&mut program).is_empty());
    }
}
