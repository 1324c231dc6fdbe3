//! # IR Optimizer
//!
//! Rewrite-based optimizations on the node DAG, applied in a configured
//! order rather than to a fixpoint loop over a single rule set — each named
//! pass runs once per call to [`optimize`], and dead code elimination is
//! re-run after any pass that restructures the graph so that orphaned
//! nodes never survive into code generation.
//!
//! ```text
//! Program -> [dead_code_elimination] -> [common_subexpression_elimination]
//!          -> [filter_fusion] -> [map_fusion] -> [filter_before_map] -> Program
//! ```

mod cse;
mod dce;
mod fusion;
mod reorder;

use std::collections::HashMap;

use crate::error::IocError;
use crate::ir::{IntentNode, Program};

/// One applied (or skipped) rewrite, recorded for the provenance tracker.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub pass: &'static str,
    pub description: String,
    pub original_nodes: Vec<String>,
    pub result_node: Option<String>,
}

/// The result of running a pass list: the rewritten program plus every
/// rewrite that was actually applied, in application order.
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub program: Program,
    pub rewrites: Vec<RewriteOutcome>,
}

/// Run the named passes against `program` in order, re-running dead code
/// elimination after each structural rewrite. Unrecognized pass names are
/// rejected with [`IocError::UnknownPass`] before any rewrite is attempted.
#[tracing::instrument(skip(program), fields(node_count = program.nodes.len(), passes = passes.len()))]
pub fn optimize(program: &Program, passes: &[String]) -> Result<OptimizationReport, IocError> {
    for name in passes {
        if !is_known_pass(name) {
            tracing::warn!(pass = %name, "unknown optimizer pass requested");
            return Err(IocError::UnknownPass(name.clone()));
        }
    }

    let mut current = program.clone();
    let mut rewrites = Vec::new();

    for name in passes {
        let span = tracing::debug_span!("pass", name = %name);
        let _enter = span.enter();
        let outcome = match name.as_str() {
            "dead_code_elimination" => dce::run(&mut current),
            "common_subexpression_elimination" => cse::run(&mut current),
            "filter_fusion" => fusion::run_filter_fusion(&mut current),
            "map_fusion" => fusion::run_map_fusion(&mut current),
            "filter_before_map" => reorder::run(&mut current),
            other => unreachable!("pass list was pre-validated: {other}"),
        };
        tracing::debug!(rewrites = outcome.len(), "pass applied");
        let structural = !outcome.is_empty();
        rewrites.extend(outcome);
        if structural && name != "dead_code_elimination" {
            rewrites.extend(dce::run(&mut current));
        }
    }

    rederive_capabilities(&mut current);
    tracing::info!(
        rewrites = rewrites.len(),
        nodes_before = program.nodes.len(),
        nodes_after = current.nodes.len(),
        "optimization complete"
    );

    Ok(OptimizationReport {
        program: current,
        rewrites,
    })
}

fn is_known_pass(name: &str) -> bool {
    matches!(
        name,
        "dead_code_elimination"
            | "common_subexpression_elimination"
            | "filter_fusion"
            | "map_fusion"
            | "filter_before_map"
    )
}

/// Re-derive every node's capability after a round of rewrites, since a
/// fused node's complexity is generally not equal to either operand's.
fn rederive_capabilities(program: &mut Program) {
    for node in &mut program.nodes {
        node.capability = crate::capability::derive_capability(&node.kind);
    }
}

/// Build a lookup of node id to the ids that consume it as an input.
pub(crate) fn consumer_counts(program: &Program) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = program.nodes.iter().map(|n| (n.id.clone(), 0)).collect();
    for node in &program.nodes {
        for input in &node.inputs {
            if let Some(c) = counts.get_mut(input) {
                *c += 1;
            }
        }
    }
    for output in &program.outputs {
        if let Some(c) = counts.get_mut(output) {
            *c += 1;
        }
    }
    counts
}

pub(crate) fn node_index(program: &Program) -> HashMap<String, usize> {
    program
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect()
}

pub(crate) fn single_input(node: &IntentNode) -> Option<&str> {
    if node.inputs.len() == 1 {
        Some(node.inputs[0].as_str())
    } else {
        None
    }
}
