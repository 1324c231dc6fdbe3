//! # Execution Engine
//!
//! Budget enforcement (C9) and the DAG interpreter that every backend
//! dispatches to.

pub mod budget;
pub mod interpreter;

pub use budget::{BudgetEnforcer, BudgetLimits};
pub use interpreter::{run_program, NodeValue};
