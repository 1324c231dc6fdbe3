//! # Code Generator
//!
//! Lowers an optimized [`Program`] to source text (validated against the
//! generated-code shape/size guards) and wires up a callable artifact that
//! executes the program via [`crate::execution::interpreter`].
//!
//! ## Pipeline position
//!
//! ```text
//! Optimized Program -> [Code Generator] -> CompilationArtifact -> execute()
//! ```

pub mod templates;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CompilerConfig;
use crate::error::IocError;
use crate::execution::interpreter::{run_program, NodeValue};
use crate::ir::{IrProgram, Program};
use crate::security::validate_generated_code;
use crate::value::Value;

/// A compiled program: its generated source (for diagnostics and the
/// security size/shape checks), size and timing metadata, and a callable
/// closure bound to a specific backend's execution strategy.
pub struct CompilationArtifact {
    pub backend: String,
    pub source: String,
    pub code_size: usize,
    pub compilation_time: Duration,
    pub metadata: HashMap<String, String>,
    execute_fn: Arc<dyn Fn(&HashMap<String, Vec<Value>>) -> Result<HashMap<String, NodeValue>, IocError> + Send + Sync>,
}

impl CompilationArtifact {
    /// Run the compiled program against bound named inputs.
    pub fn execute(&self, inputs: &HashMap<String, Vec<Value>>) -> Result<HashMap<String, NodeValue>, IocError> {
        (self.execute_fn)(inputs)
    }
}

/// Lower every node to source text in topological order, then validate the
/// concatenated source against §4.4/§4.8's size and shape guards.
pub fn lower_program_source(program: &Program) -> Result<String, IocError> {
    let ir = IrProgram::new(program);
    let order = ir.execution_order();
    let mut lines = Vec::with_capacity(order.len());
    for id in &order {
        let node = ir.node(id).ok_or_else(|| IocError::CompilationError {
            node_id: Some(id.clone()),
            detail: "node referenced in execution order is missing".to_string(),
        })?;
        lines.push(templates::lower_node(node)?);
    }
    Ok(lines.join("\n"))
}

/// Compile `program` for the named backend: lower to source, validate it,
/// and build a [`CompilationArtifact`] whose `execute` dispatches to the
/// shared DAG interpreter.
#[tracing::instrument(skip(program, config), fields(backend = %backend_name, node_count = program.nodes.len()))]
pub fn compile(program: &Program, backend_name: &str, config: &CompilerConfig) -> Result<CompilationArtifact, IocError> {
    let started = Instant::now();
    let source = lower_program_source(program)?;
    if let Err(e) = validate_generated_code(&source, config) {
        tracing::warn!(backend = %backend_name, "generated code rejected by security validator");
        return Err(e);
    }
    let compilation_time = started.elapsed();

    let program = program.clone();
    let budget = config.budget.clone();
    let execute_fn: Arc<dyn Fn(&HashMap<String, Vec<Value>>) -> Result<HashMap<String, NodeValue>, IocError> + Send + Sync> =
        Arc::new(move |inputs: &HashMap<String, Vec<Value>>| run_program(&program, inputs, &budget));

    let mut metadata = HashMap::new();
    metadata.insert("nodeCount".to_string(), program_node_count(&source).to_string());

    tracing::info!(
        backend = %backend_name,
        code_size = source.len(),
        compilation_time_us = compilation_time.as_micros() as u64,
        "compilation complete"
    );

    Ok(CompilationArtifact {
        backend: backend_name.to_string(),
        code_size: source.len(),
        source,
        compilation_time,
        metadata,
        execute_fn,
    })
}

fn program_node_count(source: &str) -> usize {
    source.lines().filter(|l| !l.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::CompareOp;
    use crate::ir::{IntentKind, IntentNode};

    fn sample_program() -> Program {
        Program {
            version: "1.0".to_string(),
            metadata: Default::default(),
            nodes: vec![
                IntentNode::new(
                    "in",
                    IntentKind::Input {
                        name: "nums".to_string(),
                        type_hint: None,
                    },
                    vec![],
                ),
                IntentNode::new(
                    "f",
                    IntentKind::Filter {
                        predicate: crate::dsl::Predicate::Compare {
                            op: CompareOp::Gt,
                            literal: Value::Number(0.0),
                        },
                    },
                    vec!["in".to_string()],
                ),
                IntentNode::new("out", IntentKind::Output, vec!["f".to_string()]),
            ],
            outputs: vec!["out".to_string()],
            options: None,
        }
    }

    #[test]
    fn compiled_artifact_executes_the_program() {
        let program = sample_program();
        let config = CompilerConfig::default();
        let artifact = compile(&program, "interpreter", &config).unwrap();
        assert!(artifact.source.contains("filter(in,"));
        assert!(artifact.code_size > 0);

        let mut inputs = HashMap::new();
        inputs.insert("nums".to_string(), vec![Value::Number(-1.0), Value::Number(2.0)]);
        let result = artifact.execute(&inputs).unwrap();
        let out = result.get("out").unwrap().clone().into_collection();
        assert_eq!(out.len(), 1);
        assert!(out[0].structural_eq(&Value::Number(2.0)));
    }

    #[test]
    fn generated_source_is_rejected_when_it_contains_a_forbidden_shape() {
        let mut program = sample_program();
        program.nodes.push(IntentNode::new(
            "weird",
            IntentKind::Input {
                name: "eval(x)".to_string(),
                type_hint: None,
            },
            vec![],
        ));
        program.outputs.push("weird".to_string());
        let config = CompilerConfig::default();
        assert!(compile(&program, "interpreter", &config).is_err());
    }
}
