//! Runtime budget enforcement.
//!
//! Cooperative checking: execution code calls
//! [`BudgetEnforcer::check_iteration`] periodically rather than being
//! preempted. Single-threaded, so plain counters are used in place of
//! atomics. Stack-depth enforcement is cooperative too, but the check
//! itself lives in `dsl::predicate`/`dsl::transform`
//! (`evaluate_checked`/`apply_checked`) rather than on `BudgetEnforcer`,
//! since `Predicate`/`Transform` recurse on their own and have no enforcer
//! instance to call back into; [`BudgetEnforcer::max_stack_depth`] is the
//! cap the interpreter reads out and passes down into that recursion.

use std::time::{Duration, Instant};

use crate::capability::ComplexityClass;
use crate::config::BudgetConfig;
use crate::error::{BudgetKind, IocError};

/// Per-invocation limits, derived once from [`BudgetConfig`].
#[derive(Debug, Clone, Copy)]
pub struct BudgetLimits {
    pub max_iterations: u64,
    pub max_time: Duration,
    pub max_stack_depth: usize,
}

impl From<&BudgetConfig> for BudgetLimits {
    fn from(config: &BudgetConfig) -> Self {
        BudgetLimits {
            max_iterations: config.max_iterations,
            max_time: Duration::from_millis(config.max_time_ms),
            max_stack_depth: config.max_stack_depth,
        }
    }
}

/// Whether a node's declared complexity is high enough to warrant
/// per-iteration checks at all. Per the resolved Open Question on where to
/// insert budget checks: proven O(1)/O(log n) nodes are a no-op, since a
/// structurally-bounded node cannot run away regardless of input size;
/// checks are inserted starting at O(n log n) and up.
pub fn needs_budget_check(class: ComplexityClass) -> bool {
    class >= ComplexityClass::Linearithmic
}

/// Tracks iteration count and wall time for a single node's execution.
pub struct BudgetEnforcer {
    limits: BudgetLimits,
    started: Instant,
    iterations: u64,
}

impl BudgetEnforcer {
    pub fn new(config: &BudgetConfig) -> Self {
        BudgetEnforcer {
            limits: BudgetLimits::from(config),
            started: Instant::now(),
            iterations: 0,
        }
    }

    /// Called once per unit of work (e.g. once per item processed by a
    /// reduce or join). No-op unless the caller already determined via
    /// [`needs_budget_check`] that the node's complexity warrants it.
    pub fn check_iteration(&mut self, node_id: &str) -> Result<(), IocError> {
        self.iterations += 1;
        if self.iterations > self.limits.max_iterations {
            tracing::warn!(node_id = %node_id, iterations = self.iterations, "budget exceeded: iteration cap");
            return Err(IocError::BudgetExceeded {
                kind: BudgetKind::Iteration,
                node_id: node_id.to_string(),
            });
        }
        if self.started.elapsed() > self.limits.max_time {
            tracing::warn!(node_id = %node_id, elapsed_ms = self.started.elapsed().as_millis() as u64, "budget exceeded: time cap");
            return Err(IocError::BudgetExceeded {
                kind: BudgetKind::Time,
                node_id: node_id.to_string(),
            });
        }
        Ok(())
    }

    /// The recursion depth cap passed to the DSL's own depth-checked
    /// evaluation (`Predicate::evaluate_checked`/`Transform::apply_checked`).
    /// Stack depth is enforced at the point of recursion rather than here,
    /// since `evaluate`/`apply` are pure functions of `x` with no access to
    /// an enforcer instance.
    pub fn max_stack_depth(&self) -> usize {
        self.limits.max_stack_depth
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
