//! Single-consumer fusion rewrites.
//!
//! `Filter(Filter(x, p1), p2)` -> `Filter(x, p1 && p2)` and
//! `Map(Map(x, t1), t2)` -> `Map(x, t1 then t2)`, applied only when the
//! inner node has exactly one consumer — fusing a node with fan-out would
//! duplicate its work at every other consumer.

use super::{consumer_counts, node_index, single_input, RewriteOutcome};
use crate::dsl::{Predicate, Transform};
use crate::ir::{IntentKind, Program};

pub(super) fn run_filter_fusion(program: &mut Program) -> Vec<RewriteOutcome> {
    let mut rewrites = Vec::new();
    let max_rounds = program.nodes.len().max(1);

    for _ in 0..max_rounds {
        let counts = consumer_counts(program);
        let index = node_index(program);

        let mut fused = None;
        for node in &program.nodes {
            let IntentKind::Filter { predicate: outer } = &node.kind else {
                continue;
            };
            let Some(input_id) = single_input(node) else {
                continue;
            };
            if counts.get(input_id).copied().unwrap_or(0) != 1 {
                continue;
            }
            let Some(&inner_idx) = index.get(input_id) else {
                continue;
            };
            let IntentKind::Filter { predicate: inner } = &program.nodes[inner_idx].kind else {
                continue;
            };
            fused = Some((
                node.id.clone(),
                input_id.to_string(),
                inner.clone(),
                outer.clone(),
            ));
            break;
        }

        let Some((outer_id, inner_id, inner_pred, outer_pred)) = fused else {
            break;
        };

        let inner_node_inputs = program
            .nodes
            .iter()
            .find(|n| n.id == inner_id)
            .map(|n| n.inputs.clone())
            .unwrap_or_default();

        for node in &mut program.nodes {
            if node.id == outer_id {
                node.kind = IntentKind::Filter {
                    predicate: Predicate::And {
                        list: vec![inner_pred, outer_pred],
                    },
                };
                node.inputs = inner_node_inputs.clone();
            }
        }

        rewrites.push(RewriteOutcome {
            pass: "filter_fusion",
            description: format!("fused filter '{inner_id}' into '{outer_id}'"),
            original_nodes: vec![inner_id, outer_id.clone()],
            result_node: Some(outer_id),
        });
    }

    rewrites
}

pub(super) fn run_map_fusion(program: &mut Program) -> Vec<RewriteOutcome> {
    let mut rewrites = Vec::new();
    let max_rounds = program.nodes.len().max(1);

    for _ in 0..max_rounds {
        let counts = consumer_counts(program);
        let index = node_index(program);

        let mut fused = None;
        for node in &program.nodes {
            let IntentKind::Map { transform: outer } = &node.kind else {
                continue;
            };
            let Some(input_id) = single_input(node) else {
                continue;
            };
            if counts.get(input_id).copied().unwrap_or(0) != 1 {
                continue;
            }
            let Some(&inner_idx) = index.get(input_id) else {
                continue;
            };
            let IntentKind::Map { transform: inner } = &program.nodes[inner_idx].kind else {
                continue;
            };
            fused = Some((
                node.id.clone(),
                input_id.to_string(),
                inner.clone(),
                outer.clone(),
            ));
            break;
        }

        let Some((outer_id, inner_id, inner_t, outer_t)) = fused else {
            break;
        };

        let inner_node_inputs = program
            .nodes
            .iter()
            .find(|n| n.id == inner_id)
            .map(|n| n.inputs.clone())
            .unwrap_or_default();

        for node in &mut program.nodes {
            if node.id == outer_id {
                node.kind = IntentKind::Map {
                    transform: Transform::Compose {
                        list: vec![inner_t, outer_t],
                    },
                };
                node.inputs = inner_node_inputs.clone();
            }
        }

        rewrites.push(RewriteOutcome {
            pass: "map_fusion",
            description: format!("fused map '{inner_id}' into '{outer_id}'"),
            original_nodes: vec![inner_id, outer_id.clone()],
            result_node: Some(outer_id),
        });
    }

    rewrites
}
