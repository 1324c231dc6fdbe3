//! DAG interpreter: evaluates a [`Program`] over bound input collections.
//!
//! Every concrete backend in [`crate::backend`] ultimately calls this
//! evaluator — backends differ in the source text they report and the
//! performance/availability estimates they advertise, not in how a node's
//! semantics are computed, since the closed DSL algebra has exactly one
//! meaning per node regardless of target.

use std::collections::HashMap;

use super::budget::{needs_budget_check, BudgetEnforcer};
use crate::capability::derive_capability;
use crate::config::BudgetConfig;
use crate::error::IocError;
use crate::ir::{IntentKind, IrProgram, JoinType, Program};
use crate::value::Value;

/// What a node evaluates to: either a bag of values (the common case) or a
/// single reduced value.
#[derive(Debug, Clone)]
pub enum NodeValue {
    Collection(Vec<Value>),
    Scalar(Value),
}

impl NodeValue {
    pub fn into_collection(self) -> Vec<Value> {
        match self {
            NodeValue::Collection(items) => items,
            NodeValue::Scalar(v) => vec![v],
        }
    }

    fn as_collection(&self, node_id: &str) -> Result<&[Value], IocError> {
        match self {
            NodeValue::Collection(items) => Ok(items),
            NodeValue::Scalar(_) => Err(IocError::ExecutionError {
                node_id: node_id.to_string(),
                cause: "expected a collection but found a scalar".to_string(),
            }),
        }
    }
}

/// Evaluate every node of `program` in topological order, binding
/// `inputs` by name to the program's `Input` nodes. Returns every node's
/// computed value, keyed by node id.
#[tracing::instrument(skip(program, inputs, budget_config), fields(node_count = program.nodes.len()))]
pub fn run_program(
    program: &Program,
    inputs: &HashMap<String, Vec<Value>>,
    budget_config: &BudgetConfig,
) -> Result<HashMap<String, NodeValue>, IocError> {
    let ir = IrProgram::new(program);
    let order = ir.execution_order();
    let mut values: HashMap<String, NodeValue> = HashMap::new();

    for node_id in &order {
        let node = ir.node(node_id).ok_or_else(|| IocError::ExecutionError {
            node_id: node_id.clone(),
            cause: "node referenced in execution order is missing".to_string(),
        })?;

        let mut enforcer = BudgetEnforcer::new(budget_config);
        let complexity = derive_capability(&node.kind).max_complexity;
        let checked = needs_budget_check(complexity);
        let max_stack_depth = enforcer.max_stack_depth();

        let result = evaluate_node(
            &node.kind,
            &node.inputs,
            &values,
            inputs,
            node_id,
            checked,
            &mut enforcer,
            max_stack_depth,
        )
        .inspect_err(|e| tracing::warn!(node_id = %node_id, error = %e, "node evaluation failed"))?;
        values.insert(node_id.clone(), result);
    }

    tracing::debug!(nodes_evaluated = values.len(), "program execution complete");
    Ok(values)
}

fn fetch_collection<'a>(
    input_id: &str,
    values: &'a HashMap<String, NodeValue>,
    node_id: &str,
) -> Result<&'a [Value], IocError> {
    values
        .get(input_id)
        .ok_or_else(|| IocError::ExecutionError {
            node_id: node_id.to_string(),
            cause: format!("input '{input_id}' has not been evaluated yet"),
        })?
        .as_collection(input_id)
}

#[allow(clippy::too_many_arguments)]
fn evaluate_node(
    kind: &IntentKind,
    inputs: &[String],
    values: &HashMap<String, NodeValue>,
    bound_inputs: &HashMap<String, Vec<Value>>,
    node_id: &str,
    checked: bool,
    enforcer: &mut BudgetEnforcer,
    max_stack_depth: usize,
) -> Result<NodeValue, IocError> {
    match kind {
        IntentKind::Input { name, .. } => {
            let items = bound_inputs.get(name).ok_or_else(|| IocError::ExecutionError {
                node_id: node_id.to_string(),
                cause: format!("no binding provided for input '{name}'"),
            })?;
            Ok(NodeValue::Collection(items.clone()))
        }
        IntentKind::Constant { value } => Ok(NodeValue::Scalar(value.clone())),
        IntentKind::Filter { predicate } => {
            let items = fetch_collection(&inputs[0], values, node_id)?;
            let mut out = Vec::new();
            for item in items {
                if checked {
                    enforcer.check_iteration(node_id)?;
                }
                if predicate.evaluate_checked(item, node_id, 0, max_stack_depth)? {
                    out.push(item.clone());
                }
            }
            Ok(NodeValue::Collection(out))
        }
        IntentKind::Map { transform } => {
            let items = fetch_collection(&inputs[0], values, node_id)?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if checked {
                    enforcer.check_iteration(node_id)?;
                }
                out.push(transform.apply_checked(item, node_id, 0, max_stack_depth)?);
            }
            Ok(NodeValue::Collection(out))
        }
        IntentKind::Reduce { reduction, initial } => {
            let items = fetch_collection(&inputs[0], values, node_id)?;
            let combined: Vec<Value>;
            let items_ref: &[Value] = if let Some(seed) = initial {
                let mut v = Vec::with_capacity(items.len() + 1);
                v.push(seed.clone());
                v.extend_from_slice(items);
                combined = v;
                &combined
            } else {
                items
            };
            if checked {
                for _ in 0..items_ref.len() {
                    enforcer.check_iteration(node_id)?;
                }
            }
            Ok(NodeValue::Scalar(reduction.reduce(items_ref, node_id, max_stack_depth)?))
        }
        IntentKind::Sort {
            key_transform,
            descending,
        } => {
            let items = fetch_collection(&inputs[0], values, node_id)?;
            let mut keyed: Vec<(Value, Value)> = Vec::with_capacity(items.len());
            for item in items {
                let key = match key_transform {
                    Some(t) => t.apply_checked(item, node_id, 0, max_stack_depth)?,
                    None => item.clone(),
                };
                keyed.push((key, item.clone()));
            }
            keyed.sort_by(|(a, _), (b, _)| a.lexicographic_cmp(b));
            if *descending {
                keyed.reverse();
            }
            if checked {
                for _ in 0..keyed.len() {
                    enforcer.check_iteration(node_id)?;
                }
            }
            Ok(NodeValue::Collection(keyed.into_iter().map(|(_, v)| v).collect()))
        }
        IntentKind::Distinct { key_transform } => {
            let items = fetch_collection(&inputs[0], values, node_id)?;
            let mut seen: Vec<Value> = Vec::new();
            let mut out = Vec::new();
            for item in items {
                if checked {
                    enforcer.check_iteration(node_id)?;
                }
                let key = match key_transform {
                    Some(t) => t.apply_checked(item, node_id, 0, max_stack_depth)?,
                    None => item.clone(),
                };
                if !seen.iter().any(|k| k.structural_eq(&key)) {
                    seen.push(key);
                    out.push(item.clone());
                }
            }
            Ok(NodeValue::Collection(out))
        }
        IntentKind::Flatten { depth } => {
            let items = fetch_collection(&inputs[0], values, node_id)?;
            let mut out = Vec::new();
            for item in items {
                if checked {
                    enforcer.check_iteration(node_id)?;
                }
                flatten_into(item, *depth, &mut out);
            }
            Ok(NodeValue::Collection(out))
        }
        IntentKind::GroupBy { key_transform } => {
            let items = fetch_collection(&inputs[0], values, node_id)?;
            let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
            for item in items {
                if checked {
                    enforcer.check_iteration(node_id)?;
                }
                let key = key_transform.apply_checked(item, node_id, 0, max_stack_depth)?;
                match groups.iter_mut().find(|(k, _)| k.structural_eq(&key)) {
                    Some((_, bucket)) => bucket.push(item.clone()),
                    None => groups.push((key, vec![item.clone()])),
                }
            }
            let out = groups
                .into_iter()
                .map(|(key, bucket)| {
                    Value::Object(vec![
                        ("key".to_string(), key),
                        ("items".to_string(), Value::Array(bucket)),
                    ])
                })
                .collect();
            Ok(NodeValue::Collection(out))
        }
        IntentKind::Join {
            left_key,
            right_key,
            join_type,
        } => {
            let left = fetch_collection(&inputs[0], values, node_id)?;
            let right = fetch_collection(&inputs[1], values, node_id)?;
            let mut out = Vec::new();
            let mut right_matched = vec![false; right.len()];
            for l in left {
                let lk = left_key.apply_checked(l, node_id, 0, max_stack_depth)?;
                let mut matched = false;
                for (j, r) in right.iter().enumerate() {
                    if checked {
                        enforcer.check_iteration(node_id)?;
                    }
                    let rk = right_key.apply_checked(r, node_id, 0, max_stack_depth)?;
                    if lk.structural_eq(&rk) {
                        matched = true;
                        right_matched[j] = true;
                        out.push(join_pair(l, r));
                    }
                }
                if !matched && matches!(join_type, JoinType::Left | JoinType::Outer) {
                    out.push(join_pair(l, &Value::Null));
                }
            }
            if matches!(join_type, JoinType::Right | JoinType::Outer) {
                for (j, r) in right.iter().enumerate() {
                    if !right_matched[j] {
                        out.push(join_pair(&Value::Null, r));
                    }
                }
            }
            Ok(NodeValue::Collection(out))
        }
        IntentKind::Slice { start, end } => {
            let items = fetch_collection(&inputs[0], values, node_id)?;
            let len = items.len() as i64;
            let resolve = |idx: Option<i64>, default: i64| -> usize {
                let raw = idx.unwrap_or(default);
                let clamped = raw.clamp(0, len);
                clamped as usize
            };
            let start_idx = resolve(*start, 0);
            let end_idx = resolve(*end, len).max(start_idx);
            Ok(NodeValue::Collection(items[start_idx..end_idx].to_vec()))
        }
        IntentKind::Concat => {
            let mut out = Vec::new();
            for input_id in inputs {
                out.extend_from_slice(fetch_collection(input_id, values, node_id)?);
            }
            Ok(NodeValue::Collection(out))
        }
        IntentKind::Output => {
            let upstream = values.get(&inputs[0]).ok_or_else(|| IocError::ExecutionError {
                node_id: node_id.to_string(),
                cause: format!("input '{}' has not been evaluated yet", inputs[0]),
            })?;
            Ok(upstream.clone())
        }
    }
}

fn join_pair(left: &Value, right: &Value) -> Value {
    Value::Object(vec![
        ("left".to_string(), left.clone()),
        ("right".to_string(), right.clone()),
    ])
}

fn flatten_into(value: &Value, depth: usize, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) if depth > 0 => {
            for item in items {
                flatten_into(item, depth - 1, out);
            }
        }
        other => out.push(other.clone()),
    }
}
