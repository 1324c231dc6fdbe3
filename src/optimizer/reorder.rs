//! Filter-before-map reordering.
//!
//! `Map(x, t)` followed by a single-consumer `Filter(_, p)` is rewritten to
//! filter first and map second when `p.evaluate(t(x)) == p.evaluate(x)` is
//! provable for every `x` by structural inspection alone — in that case
//! the set of items reaching the final output is identical either way,
//! and discarding non-matching items before mapping avoids doing the
//! map's work on values the filter would have dropped.
//!
//! This is the conservative static alternative from §4.7: no empirical
//! check over a synthetic input bank is performed, so the rewrite applies
//! only when [`predicate_is_invariant_under`] proves the equivalence,
//! never when the two merely seem unlikely to interact. In particular a
//! predicate that inspects `x` as a whole (`Compare`, `TypeCheck`) is only
//! ever safe to hoist across `Transform::Identity`, since any other
//! transform can change `x`'s value or type outright; a predicate that
//! only inspects named fields (`CompareProperty`) is additionally safe
//! across a `Construct` that forwards that exact field through unchanged
//! (`Transform::Property` of the same name) — every other transform shape
//! either discards fields it doesn't mention or cannot be proven not to,
//! so it is treated as unsafe.

use super::{consumer_counts, node_index, single_input, RewriteOutcome};
use crate::dsl::{Predicate, Transform};
use crate::ir::{IntentKind, Program};

/// Whether `t` provably leaves the named field's value unchanged for every
/// `x`: either `t` is the identity, or `t` is a `Construct` whose `id`
/// entry forwards `x.id` verbatim via `Transform::Property([id])`.
fn field_is_preserved(t: &Transform, id: &str) -> bool {
    match t {
        Transform::Identity => true,
        Transform::Construct { fields } => fields.iter().any(|(name, sub)| {
            name == id
                && matches!(sub, Transform::Property { path } if path.len() == 1 && path[0] == id)
        }),
        _ => false,
    }
}

/// Whether `p.evaluate(t(x)) == p.evaluate(x)` for every `x`, proved
/// structurally rather than empirically.
fn predicate_is_invariant_under(p: &Predicate, t: &Transform) -> bool {
    if matches!(t, Transform::Identity) {
        return true;
    }
    match p {
        Predicate::CompareProperty { identifier, .. } => field_is_preserved(t, identifier),
        Predicate::Always { .. } => true,
        Predicate::And { list } | Predicate::Or { list } => {
            list.iter().all(|inner| predicate_is_invariant_under(inner, t))
        }
        Predicate::Not { inner } => predicate_is_invariant_under(inner, t),
        // `Compare`/`TypeCheck` inspect `x` as a whole, so they can only be
        // proven invariant across the identity transform, already handled
        // above.
        Predicate::Compare { .. } | Predicate::TypeCheck { .. } => false,
    }
}

pub(super) fn run(program: &mut Program) -> Vec<RewriteOutcome> {
    let mut rewrites = Vec::new();
    let max_rounds = program.nodes.len().max(1);

    for _ in 0..max_rounds {
        let counts = consumer_counts(program);
        let index = node_index(program);

        let mut swap = None;
        for node in &program.nodes {
            let IntentKind::Filter { predicate } = &node.kind else {
                continue;
            };
            let Some(map_id) = single_input(node) else {
                continue;
            };
            if counts.get(map_id).copied().unwrap_or(0) != 1 {
                continue;
            }
            let Some(&map_idx) = index.get(map_id) else {
                continue;
            };
            let IntentKind::Map { transform } = &program.nodes[map_idx].kind else {
                continue;
            };

            if !predicate_is_invariant_under(predicate, transform) {
                continue;
            }

            swap = Some((node.id.clone(), map_id.to_string()));
            break;
        }

        let Some((filter_id, map_id)) = swap else {
            break;
        };

        let filter_idx = program.nodes.iter().position(|n| n.id == filter_id).unwrap();
        let map_idx = program.nodes.iter().position(|n| n.id == map_id).unwrap();

        let filter_kind = program.nodes[filter_idx].kind.clone();
        let map_kind = program.nodes[map_idx].kind.clone();
        program.nodes[map_idx].kind = filter_kind;
        program.nodes[filter_idx].kind = map_kind;

        rewrites.push(RewriteOutcome {
            pass: "filter_before_map",
            description: format!("reordered filter '{filter_id}' ahead of map '{map_id}'"),
            original_nodes: vec![map_id, filter_id],
            result_node: None,
        });
    }

    rewrites
}
