//! Error taxonomy for the compilation pipeline.
//!
//! Named kinds rather than ad hoc strings, per §7: each variant carries the
//! node id (when one is applicable) and a message so the provenance tracker
//! can decorate a failure with the chain of rewrites that produced the
//! offending node.

use thiserror::Error;

/// Reasons a budget (iteration count, wall time, or stack depth) can be
/// exceeded at runtime. See [`crate::budget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetKind {
    Iteration,
    Time,
    Stack,
}

impl std::fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BudgetKind::Iteration => "iteration",
            BudgetKind::Time => "time",
            BudgetKind::Stack => "stack",
        };
        write!(f, "{s}")
    }
}

/// The crate's unified error type. Every fallible core operation returns
/// `Result<T, IocError>`.
#[derive(Debug, Error, Clone)]
pub enum IocError {
    /// A value outside the legal `Value` sum reached a boundary.
    #[error("unsafe value: {detail}")]
    UnsafeValue { detail: String },

    /// One or more structural invariants failed. Validation errors are
    /// collected and reported together, never fail-fast.
    #[error("invalid program: {}", reasons.join("; "))]
    InvalidProgram { reasons: Vec<String> },

    /// The optimizer was asked to run an unrecognized pass name.
    #[error("unknown optimizer pass: {0}")]
    UnknownPass(String),

    /// An explicit backend request named an unavailable backend.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Code generation failed while lowering a specific intent.
    #[error("compilation error{}: {detail}", node_id.as_ref().map(|id| format!(" at node '{id}'")).unwrap_or_default())]
    CompilationError {
        node_id: Option<String>,
        detail: String,
    },

    /// A reduction without a natural identity (`Min`, `Max`, `Average`,
    /// `First`, `Last`) ran over empty input.
    #[error("empty reduction at node '{node_id}'")]
    EmptyReduction { node_id: String },

    /// A runtime resource cap was hit.
    #[error("budget exceeded ({kind}) at node '{node_id}'")]
    BudgetExceeded { kind: BudgetKind, node_id: String },

    /// Any other runtime failure attributed to a node.
    #[error("execution error at node '{node_id}': {cause}")]
    ExecutionError { node_id: String, cause: String },
}

/// Convenience alias used throughout the crate.
pub type IocResult<T> = Result<T, IocError>;

impl IocError {
    /// The node id this error is attributed to, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            IocError::CompilationError { node_id, .. } => node_id.as_deref(),
            IocError::EmptyReduction { node_id }
            | IocError::BudgetExceeded { node_id, .. }
            | IocError::ExecutionError { node_id, .. } => Some(node_id.as_str()),
            _ => None,
        }
    }
}
