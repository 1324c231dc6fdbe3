//! Capability calculus: determinism and composition rules exercised at the
//! node level rather than on bare predicate/transform values.

use ioc::capability::{derive_capability, ComplexityClass};
use ioc::dsl::{ArithmeticOp, CompareOp, Predicate, Transform};
use ioc::ir::{IntentKind, JoinType};
use ioc::value::Value;

/// Universal invariant 5: capability derivation is a function — two
/// structurally equal nodes receive equal capabilities.
#[test]
fn structurally_equal_nodes_derive_equal_capabilities() {
    let a = IntentKind::Filter {
        predicate: Predicate::Compare { op: CompareOp::Gt, literal: Value::Number(10.0) },
    };
    let b = IntentKind::Filter {
        predicate: Predicate::Compare { op: CompareOp::Gt, literal: Value::Number(10.0) },
    };
    assert_eq!(derive_capability(&a), derive_capability(&b));
}

#[test]
fn sort_is_linearithmic_and_bounded() {
    let cap = derive_capability(&IntentKind::Sort { key_transform: None, descending: false });
    assert_eq!(cap.max_complexity, ComplexityClass::Linearithmic);
    assert_eq!(cap.termination_guarantee, ioc::capability::TerminationGuarantee::Bounded);
}

#[test]
fn join_is_quadratic_and_not_parallelizable() {
    let cap = derive_capability(&IntentKind::Join {
        left_key: Transform::Identity,
        right_key: Transform::Identity,
        join_type: JoinType::Inner,
    });
    assert_eq!(cap.max_complexity, ComplexityClass::Quadratic);
    assert!(!cap.parallelizable);
}

/// A `Map` wrapping a `Compose` of a constant-time arithmetic op and a
/// linear string op inherits the coarser (linear) complexity.
#[test]
fn composed_transform_takes_the_coarser_branch_complexity() {
    let t = Transform::Compose {
        list: vec![
            Transform::Arithmetic { op: ArithmeticOp::Add, operand: Some(Value::Number(1.0)) },
            Transform::String { op: ioc::dsl::StringOp::Uppercase, args: vec![] },
        ],
    };
    let cap = derive_capability(&IntentKind::Map { transform: t });
    assert_eq!(cap.max_complexity, ComplexityClass::Linear);
}

#[test]
fn every_intent_kind_is_pure() {
    let kinds = vec![
        IntentKind::Input { name: "x".to_string(), type_hint: None },
        IntentKind::Constant { value: Value::Null },
        IntentKind::Output,
        IntentKind::Concat,
    ];
    for kind in kinds {
        assert!(derive_capability(&kind).side_effects_pure);
    }
}
