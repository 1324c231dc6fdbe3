//! Common subexpression elimination: nodes with identical kind signature
//! and identical input lists compute the same value and can be merged.
//!
//! Runs to a local fixpoint (bounded by node count) since merging one pair
//! can expose a second, downstream pair with now-identical inputs.

use std::collections::HashMap;

use super::RewriteOutcome;
use crate::ir::Program;

pub(super) fn run(program: &mut Program) -> Vec<RewriteOutcome> {
    let mut rewrites = Vec::new();
    let max_rounds = program.nodes.len().max(1);

    for _ in 0..max_rounds {
        let mut canonical: HashMap<String, String> = HashMap::new();
        let mut replace: HashMap<String, String> = HashMap::new();

        for node in &program.nodes {
            // Per the canonicalization rule, the signature sorts `inputs`
            // (unordered identity of the input set) while leaving operand
            // order inside predicates/transforms alone — `And`/`Or`/`Compose`
            // order is semantically meaningful for short-circuiting and is
            // part of `canonical_signature()` itself.
            let mut sorted_inputs = node.inputs.clone();
            sorted_inputs.sort();
            let signature = format!("{}|{}", node.kind.canonical_signature(), sorted_inputs.join(","));
            match canonical.get(&signature) {
                Some(kept_id) => {
                    replace.insert(node.id.clone(), kept_id.clone());
                }
                None => {
                    canonical.insert(signature, node.id.clone());
                }
            }
        }

        if replace.is_empty() {
            break;
        }

        for node in &mut program.nodes {
            for input in &mut node.inputs {
                if let Some(kept) = replace.get(input) {
                    *input = kept.clone();
                }
            }
        }
        for output in &mut program.outputs {
            if let Some(kept) = replace.get(output) {
                *output = kept.clone();
            }
        }

        let removed: Vec<String> = replace.keys().cloned().collect();
        program.nodes.retain(|n| !replace.contains_key(&n.id));

        for (dup_id, kept_id) in &replace {
            rewrites.push(RewriteOutcome {
                pass: "common_subexpression_elimination",
                description: format!("merged duplicate node '{dup_id}' into '{kept_id}'"),
                original_nodes: vec![dup_id.clone()],
                result_node: Some(kept_id.clone()),
            });
        }
        let _ = removed;
    }

    rewrites
}
