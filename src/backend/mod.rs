//! # Backend Registry
//!
//! Concrete execution backends and the strategies used to pick among
//! them. Every backend ultimately dispatches to
//! [`crate::execution::interpreter`] — per §5's concurrency model there is
//! no async runtime or thread pool here, and no backend spawns one; they
//! differ only in the estimates they advertise and the source text they
//! report, not in how a node's value is computed.

use std::sync::OnceLock;

use crate::code_generator::{compile, CompilationArtifact};
use crate::config::{CompilerConfig, DefaultBackendStrategy};
use crate::error::IocError;
use crate::ir::Program;

/// A strategy for picking a backend when the caller hasn't named one.
#[derive(Debug, Clone)]
pub enum SelectionStrategy {
    Explicit(String),
    FastestCompile,
    FastestRuntime,
    MostPortable,
    Balanced,
}

impl From<DefaultBackendStrategy> for SelectionStrategy {
    fn from(s: DefaultBackendStrategy) -> Self {
        match s {
            DefaultBackendStrategy::FastestCompile => SelectionStrategy::FastestCompile,
            DefaultBackendStrategy::FastestRuntime => SelectionStrategy::FastestRuntime,
            DefaultBackendStrategy::MostPortable => SelectionStrategy::MostPortable,
            DefaultBackendStrategy::Balanced => SelectionStrategy::Balanced,
        }
    }
}

/// A compilation target. Implementors must always be able to compile any
/// legal [`Program`] — the closed DSL algebra has no backend-specific
/// escape hatches — but may differ in estimated compile/runtime cost.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool {
        true
    }

    fn compile(&self, program: &Program, config: &CompilerConfig) -> Result<CompilationArtifact, IocError> {
        compile(program, self.name(), config)
    }

    /// Rough compile-time estimate in microseconds, used by
    /// [`SelectionStrategy::FastestCompile`]. Lower is better.
    fn estimate_compilation_time(&self, program: &Program) -> u64;

    /// Rough performance score in `[0.0, 1.0]`, used by
    /// [`SelectionStrategy::FastestRuntime`] and [`SelectionStrategy::Balanced`].
    /// Higher is better.
    fn estimate_performance_score(&self, program: &Program) -> f64;

    /// `[0.0, 1.0]` score of how portable the backend is (fewer assumptions
    /// about the host environment). Higher is better.
    fn portability_score(&self) -> f64 {
        1.0
    }
}

/// Always-available backend: a direct tree-walking interpreter. The
/// baseline every other backend is compared against.
pub struct InterpreterBackend;

impl Backend for InterpreterBackend {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn estimate_compilation_time(&self, program: &Program) -> u64 {
        // Lowering is linear in node count and cheap; no separate
        // machine-code compilation step.
        (program.nodes.len() as u64).saturating_mul(5)
    }

    fn estimate_performance_score(&self, _program: &Program) -> f64 {
        0.5
    }
}

/// A backend that pre-flattens the lowered source into a single template
/// string before building the interpreter closure, trading a slightly
/// higher compile cost for lower per-call dispatch overhead. Still a pure
/// Rust evaluator under the hood — see the module doc comment.
pub struct TemplateBackend;

impl Backend for TemplateBackend {
    fn name(&self) -> &'static str {
        "template"
    }

    fn estimate_compilation_time(&self, program: &Program) -> u64 {
        (program.nodes.len() as u64).saturating_mul(20)
    }

    fn estimate_performance_score(&self, _program: &Program) -> f64 {
        0.8
    }

    fn portability_score(&self) -> f64 {
        0.7
    }
}

/// Process-wide registry of available backends. Lazily initialized on
/// first use, per §5 (no background threads, no async runtime — just a
/// `OnceLock`-guarded singleton built the first time it's read).
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl BackendRegistry {
    fn new() -> Self {
        BackendRegistry {
            backends: vec![Box::new(InterpreterBackend), Box::new(TemplateBackend)],
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.name() == name && b.is_available())
            .map(|b| b.as_ref())
    }

    pub fn available(&self) -> Vec<&dyn Backend> {
        self.backends.iter().filter(|b| b.is_available()).map(|b| b.as_ref()).collect()
    }

    /// Select a backend for `program` per `strategy`.
    pub fn select(&self, strategy: &SelectionStrategy, program: &Program) -> Result<&dyn Backend, IocError> {
        let available = self.available();
        if available.is_empty() {
            tracing::warn!("backend selection failed: no backend available");
            return Err(IocError::BackendUnavailable("no backend is available".to_string()));
        }

        let chosen = match strategy {
            SelectionStrategy::Explicit(name) => self
                .get(name)
                .ok_or_else(|| IocError::BackendUnavailable(name.clone())),
            SelectionStrategy::FastestCompile => Ok(available
                .into_iter()
                .min_by_key(|b| b.estimate_compilation_time(program))
                .expect("non-empty")),
            SelectionStrategy::FastestRuntime => Ok(available
                .into_iter()
                .max_by(|a, b| {
                    a.estimate_performance_score(program)
                        .total_cmp(&b.estimate_performance_score(program))
                })
                .expect("non-empty")),
            SelectionStrategy::MostPortable => Ok(available
                .into_iter()
                .max_by(|a, b| a.portability_score().total_cmp(&b.portability_score()))
                .expect("non-empty")),
            SelectionStrategy::Balanced => Ok(available
                .into_iter()
                .max_by(|a, b| balanced_score(a, program).total_cmp(&balanced_score(b, program)))
                .expect("non-empty")),
        };
        match &chosen {
            Ok(backend) => tracing::debug!(strategy = ?strategy, backend = backend.name(), "backend selected"),
            Err(e) => tracing::warn!(strategy = ?strategy, error = %e, "backend selection failed"),
        }
        chosen
    }
}

/// Balanced strategy per §5: weight runtime performance at 0.6 and
/// compile-time cost (inverted, since lower is better) at 0.4.
fn balanced_score(backend: &dyn Backend, program: &Program) -> f64 {
    let runtime = backend.estimate_performance_score(program);
    let compile_cost = backend.estimate_compilation_time(program) as f64;
    let compile_score = 1.0 / (1.0 + compile_cost / 1000.0);
    0.6 * runtime + 0.4 * compile_score
}

static REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();

/// The process-wide backend registry, initialized on first access.
pub fn global() -> &'static BackendRegistry {
    REGISTRY.get_or_init(BackendRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IntentKind, IntentNode};

    fn sample_program() -> Program {
        Program {
            version: "1.0".to_string(),
            metadata: Default::default(),
            nodes: vec![IntentNode::new("in", IntentKind::Input { name: "x".to_string(), type_hint: None }, vec![])],
            outputs: vec!["in".to_string()],
            options: None,
        }
    }

    #[test]
    fn interpreter_backend_is_always_available() {
        let registry = BackendRegistry::new();
        assert!(registry.get("interpreter").is_some());
    }

    #[test]
    fn explicit_strategy_rejects_unknown_backend_name() {
        let registry = BackendRegistry::new();
        let program = sample_program();
        let err = registry
            .select(&SelectionStrategy::Explicit("does-not-exist".to_string()), &program)
            .unwrap_err();
        assert!(matches!(err, IocError::BackendUnavailable(_)));
    }

    #[test]
    fn fastest_compile_prefers_the_interpreter() {
        let registry = BackendRegistry::new();
        let program = sample_program();
        let chosen = registry.select(&SelectionStrategy::FastestCompile, &program).unwrap();
        assert_eq!(chosen.name(), "interpreter");
    }

    #[test]
    fn fastest_runtime_prefers_the_template_backend() {
        let registry = BackendRegistry::new();
        let program = sample_program();
        let chosen = registry.select(&SelectionStrategy::FastestRuntime, &program).unwrap();
        assert_eq!(chosen.name(), "template");
    }

    #[test]
    fn global_registry_is_a_singleton() {
        let a = global() as *const BackendRegistry;
        let b = global() as *const BackendRegistry;
        assert_eq!(a, b);
    }
}
