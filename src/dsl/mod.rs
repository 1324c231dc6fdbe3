//! # DSL Algebra
//!
//! Tagged definitions of predicates, transforms, and reductions — the
//! closed algebra every intent is built from. Helper constructors are
//! provided for ergonomic construction but are not part of the data
//! contract: an implementer may accept bare tagged records on
//! deserialization, which is exactly what `serde`'s derived
//! `Deserialize` impls below do.

pub mod predicate;
pub mod reduction;
pub mod transform;

pub use predicate::{CompareOp, Predicate};
pub use reduction::Reduction;
pub use transform::{ArithmeticOp, ArrayOp, StringOp, Transform};
