//! # Provenance Tracker
//!
//! Append-only, diagnostics-only metadata describing where each node in a
//! program came from and what rewrites produced it. Never consulted by the
//! optimizer or code generator — a provenance entry existing or not must
//! never change a program's computed result.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::optimizer::RewriteOutcome;

/// Who introduced a node into the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedBy {
    Source,
    Optimizer,
}

/// One rewrite that touched a node, in application order.
#[derive(Debug, Clone)]
pub struct Transformation {
    pub rewrite_name: String,
    pub original_nodes: Vec<String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Provenance record for a single node.
#[derive(Debug, Clone)]
pub struct NodeProvenance {
    pub created_by: CreatedBy,
    pub source_location: Option<String>,
    pub parent_nodes: Vec<String>,
    pub transformations: Vec<Transformation>,
}

/// Per-node provenance for an entire program.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceTracker {
    entries: HashMap<String, NodeProvenance>,
}

impl ProvenanceTracker {
    pub fn new() -> Self {
        ProvenanceTracker::default()
    }

    /// Record that `node_id` came from the original, unoptimized program.
    pub fn record_source_node(&mut self, node_id: impl Into<String>, source_location: Option<String>, parent_nodes: Vec<String>) {
        self.entries.insert(
            node_id.into(),
            NodeProvenance {
                created_by: CreatedBy::Source,
                source_location,
                parent_nodes,
                transformations: Vec::new(),
            },
        );
    }

    /// Fold a batch of optimizer [`RewriteOutcome`]s into the tracker. A
    /// rewrite with a `result_node` records a transformation against that
    /// node (creating an entry if one doesn't exist yet, attributing it to
    /// the optimizer); a rewrite with no result node (e.g. dead code
    /// elimination) is recorded against each of its `original_nodes`
    /// instead, so the removal itself is still traceable.
    pub fn record_rewrites(&mut self, rewrites: &[RewriteOutcome], timestamp: DateTime<Utc>) {
        for rewrite in rewrites {
            let targets: Vec<String> = match &rewrite.result_node {
                Some(id) => vec![id.clone()],
                None => rewrite.original_nodes.clone(),
            };
            for target in targets {
                let entry = self.entries.entry(target).or_insert_with(|| NodeProvenance {
                    created_by: CreatedBy::Optimizer,
                    source_location: None,
                    parent_nodes: rewrite.original_nodes.clone(),
                    transformations: Vec::new(),
                });
                entry.transformations.push(Transformation {
                    rewrite_name: rewrite.pass.to_string(),
                    original_nodes: rewrite.original_nodes.clone(),
                    description: rewrite.description.clone(),
                    timestamp,
                });
            }
        }
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeProvenance> {
        self.entries.get(node_id)
    }

    /// Walk the parent-node chain back to every source node reachable from
    /// `node_id`, breaking cycles defensively (none should exist in a
    /// validated program, but provenance chains are diagnostics and must
    /// never panic).
    pub fn trace_back_to_source(&self, node_id: &str) -> Vec<String> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![node_id.to_string()];
        let mut sources = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            match self.entries.get(&id) {
                Some(entry) if entry.created_by == CreatedBy::Source => sources.push(id),
                Some(entry) => {
                    for parent in &entry.parent_nodes {
                        if !visited.contains(parent) {
                            stack.push(parent.clone());
                        }
                    }
                }
                None => sources.push(id),
            }
        }

        sources
    }
}
