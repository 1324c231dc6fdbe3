//! End-to-end scenarios S1-S6.

use std::collections::HashMap;

use ioc::capability::ComplexityClass;
use ioc::config::CompilerConfig;
use ioc::dsl::{ArithmeticOp, CompareOp, Predicate, Reduction, StringOp, Transform};
use ioc::execution::run_program;
use ioc::ir::{IntentKind, IntentNode, JoinType, Program, ProgramMetadata};
use ioc::optimizer::optimize;
use ioc::value::Value;

fn empty_program(nodes: Vec<IntentNode>, outputs: Vec<&str>) -> Program {
    Program {
        version: "1.0".to_string(),
        metadata: ProgramMetadata::default(),
        nodes,
        outputs: outputs.into_iter().map(str::to_string).collect(),
        options: None,
    }
}

fn numbers(values: &[f64]) -> Vec<Value> {
    values.iter().copied().map(Value::Number).collect()
}

/// S1 - numeric pipeline.
#[test]
fn s1_numeric_pipeline_reduces_to_150() {
    let program = empty_program(
        vec![
            IntentNode::new("in", IntentKind::Input { name: "data".to_string(), type_hint: None }, vec![]),
            IntentNode::new(
                "f1",
                IntentKind::Filter {
                    predicate: Predicate::Compare { op: CompareOp::Gt, literal: Value::Number(10.0) },
                },
                vec!["in".to_string()],
            ),
            IntentNode::new(
                "m1",
                IntentKind::Map {
                    transform: Transform::Arithmetic { op: ArithmeticOp::Multiply, operand: Some(Value::Number(2.0)) },
                },
                vec!["f1".to_string()],
            ),
            IntentNode::new(
                "m2",
                IntentKind::Map {
                    transform: Transform::Arithmetic { op: ArithmeticOp::Add, operand: Some(Value::Number(5.0)) },
                },
                vec!["m1".to_string()],
            ),
            IntentNode::new(
                "f2",
                IntentKind::Filter {
                    predicate: Predicate::Compare { op: CompareOp::Lt, literal: Value::Number(50.0) },
                },
                vec!["m2".to_string()],
            ),
            IntentNode::new("s", IntentKind::Sort { key_transform: None, descending: true }, vec!["f2".to_string()]),
            IntentNode::new("r", IntentKind::Reduce { reduction: Reduction::Sum, initial: None }, vec!["s".to_string()]),
            IntentNode::new("out", IntentKind::Output, vec!["r".to_string()]),
        ],
        vec!["out"],
    );

    let mut inputs = HashMap::new();
    inputs.insert(
        "data".to_string(),
        numbers(&[5.0, 12.0, 8.0, 20.0, 3.0, 15.0, 25.0, 30.0, 1.0, 18.0]),
    );

    let config = CompilerConfig::default();
    let result = run_program(&program, &inputs, &config.budget).unwrap();
    let out = result.get("out").unwrap().clone().into_collection();
    assert_eq!(out.len(), 1);
    assert!(out[0].structural_eq(&Value::Number(150.0)));
}

/// S2 - object pipeline.
#[test]
fn s2_object_pipeline_filters_maps_and_sorts_names() {
    let program = empty_program(
        vec![
            IntentNode::new("in", IntentKind::Input { name: "records".to_string(), type_hint: None }, vec![]),
            IntentNode::new(
                "f",
                IntentKind::Filter {
                    predicate: Predicate::CompareProperty {
                        op: CompareOp::Gt,
                        identifier: "age".to_string(),
                        literal: Value::Number(18.0),
                    },
                },
                vec!["in".to_string()],
            ),
            IntentNode::new(
                "m1",
                IntentKind::Map { transform: Transform::property(vec!["name".to_string()]).unwrap() },
                vec!["f".to_string()],
            ),
            IntentNode::new(
                "m2",
                IntentKind::Map { transform: Transform::String { op: StringOp::Uppercase, args: vec![] } },
                vec!["m1".to_string()],
            ),
            IntentNode::new("s", IntentKind::Sort { key_transform: None, descending: false }, vec!["m2".to_string()]),
            IntentNode::new("out", IntentKind::Output, vec!["s".to_string()]),
        ],
        vec!["out"],
    );

    fn record(name: &str, age: f64) -> Value {
        Value::Object(vec![
            ("name".to_string(), Value::String(name.to_string())),
            ("age".to_string(), Value::Number(age)),
        ])
    }

    let mut inputs = HashMap::new();
    inputs.insert(
        "records".to_string(),
        vec![
            record("Alice", 25.0),
            record("Bob", 17.0),
            record("Charlie", 30.0),
            record("Diana", 16.0),
            record("Eve", 22.0),
        ],
    );

    let config = CompilerConfig::default();
    let result = run_program(&program, &inputs, &config.budget).unwrap();
    let out = result.get("out").unwrap().clone().into_collection();
    let expected = ["ALICE", "CHARLIE", "EVE"];
    assert_eq!(out.len(), expected.len());
    for (got, want) in out.iter().zip(expected.iter()) {
        assert!(got.structural_eq(&Value::String((*want).to_string())));
    }
}

/// S3 - conditional transform.
#[test]
fn s3_conditional_map() {
    let program = empty_program(
        vec![
            IntentNode::new("in", IntentKind::Input { name: "numbers".to_string(), type_hint: None }, vec![]),
            IntentNode::new(
                "m",
                IntentKind::Map {
                    transform: Transform::Conditional {
                        predicate: Box::new(Predicate::Compare { op: CompareOp::Gt, literal: Value::Number(0.0) }),
                        if_true: Box::new(Transform::Arithmetic { op: ArithmeticOp::Multiply, operand: Some(Value::Number(2.0)) }),
                        if_false: Box::new(Transform::Arithmetic { op: ArithmeticOp::Add, operand: Some(Value::Number(100.0)) }),
                    },
                },
                vec!["in".to_string()],
            ),
            IntentNode::new("out", IntentKind::Output, vec!["m".to_string()]),
        ],
        vec!["out"],
    );

    let mut inputs = HashMap::new();
    inputs.insert("numbers".to_string(), numbers(&[-5.0, 10.0, -3.0, 20.0, 0.0, -1.0]));

    let config = CompilerConfig::default();
    let result = run_program(&program, &inputs, &config.budget).unwrap();
    let out = result.get("out").unwrap().clone().into_collection();
    let expected = numbers(&[95.0, 20.0, 97.0, 40.0, 100.0, 99.0]);
    assert_eq!(out.len(), expected.len());
    for (got, want) in out.iter().zip(expected.iter()) {
        assert!(got.structural_eq(want));
    }
}

fn s1_program() -> Program {
    empty_program(
        vec![
            IntentNode::new("in", IntentKind::Input { name: "data".to_string(), type_hint: None }, vec![]),
            IntentNode::new(
                "f1",
                IntentKind::Filter {
                    predicate: Predicate::Compare { op: CompareOp::Gt, literal: Value::Number(10.0) },
                },
                vec!["in".to_string()],
            ),
            IntentNode::new(
                "m1",
                IntentKind::Map {
                    transform: Transform::Arithmetic { op: ArithmeticOp::Multiply, operand: Some(Value::Number(2.0)) },
                },
                vec!["f1".to_string()],
            ),
            IntentNode::new(
                "m2",
                IntentKind::Map {
                    transform: Transform::Arithmetic { op: ArithmeticOp::Add, operand: Some(Value::Number(5.0)) },
                },
                vec!["m1".to_string()],
            ),
            IntentNode::new(
                "f2",
                IntentKind::Filter {
                    predicate: Predicate::Compare { op: CompareOp::Lt, literal: Value::Number(50.0) },
                },
                vec!["m2".to_string()],
            ),
            IntentNode::new("s", IntentKind::Sort { key_transform: None, descending: true }, vec!["f2".to_string()]),
            IntentNode::new("r", IntentKind::Reduce { reduction: Reduction::Sum, initial: None }, vec!["s".to_string()]),
            IntentNode::new("out", IntentKind::Output, vec!["r".to_string()]),
        ],
        vec!["out"],
    )
}

/// S4 - optimizer equivalence: running with no passes and with the default
/// pass list yields the same result, and the default passes strictly shrink
/// the node count (map fusion merges the two consecutive `Map` nodes).
#[test]
fn s4_optimizer_preserves_semantics_and_shrinks_the_program() {
    let program = s1_program();
    let config = CompilerConfig::default();

    let mut inputs = HashMap::new();
    inputs.insert(
        "data".to_string(),
        numbers(&[5.0, 12.0, 8.0, 20.0, 3.0, 15.0, 25.0, 30.0, 1.0, 18.0]),
    );

    let unoptimized = optimize(&program, &[]).unwrap();
    let optimized = optimize(&program, &config.optimizer.default_passes).unwrap();

    let result_unopt = run_program(&unoptimized.program, &inputs, &config.budget).unwrap();
    let result_opt = run_program(&optimized.program, &inputs, &config.budget).unwrap();

    assert!(result_unopt
        .get("out")
        .unwrap()
        .clone()
        .into_collection()[0]
        .structural_eq(&Value::Number(150.0)));
    assert!(result_opt
        .get("out")
        .unwrap()
        .clone()
        .into_collection()[0]
        .structural_eq(&Value::Number(150.0)));

    assert!(optimized.program.nodes.len() < program.nodes.len());
}

/// S5 - dead code elimination: an unreferenced `Map` subgraph is removed,
/// outputs are unchanged, and the result still validates.
#[test]
fn s5_dead_code_elimination_drops_unreferenced_subgraph() {
    let mut program = s1_program();
    program.nodes.push(IntentNode::new(
        "dead_map",
        IntentKind::Map { transform: Transform::Identity },
        vec!["in".to_string()],
    ));
    program.nodes.push(IntentNode::new(
        "dead_map_2",
        IntentKind::Map { transform: Transform::Identity },
        vec!["dead_map".to_string()],
    ));

    let report = optimize(&program, &["dead_code_elimination".to_string()]).unwrap();
    assert!(!report.program.nodes.iter().any(|n| n.id == "dead_map"));
    assert!(!report.program.nodes.iter().any(|n| n.id == "dead_map_2"));
    assert_eq!(report.program.outputs, vec!["out".to_string()]);
    assert!(report.program.ir().validate().is_valid());
}

/// S6 - rejection: a forbidden property path, and a post-hoc cycle, are both
/// caught by validation with enumerated reasons.
#[test]
fn s6_forbidden_property_path_is_rejected() {
    use ioc::security::validate_program;

    let program = empty_program(
        vec![
            IntentNode::new("in", IntentKind::Input { name: "x".to_string(), type_hint: None }, vec![]),
            IntentNode::new(
                "f",
                IntentKind::Filter {
                    predicate: Predicate::CompareProperty {
                        op: CompareOp::Eq,
                        identifier: "__proto__".to_string(),
                        literal: Value::Null,
                    },
                },
                vec!["in".to_string()],
            ),
            IntentNode::new("out", IntentKind::Output, vec!["f".to_string()]),
        ],
        vec!["out"],
    );

    let config = CompilerConfig::default();
    assert!(validate_program(&program, &config).is_err());
}

#[test]
fn s6_cycle_introduced_post_hoc_is_rejected() {
    let mut program = empty_program(
        vec![
            IntentNode::new(
                "f1",
                IntentKind::Filter { predicate: Predicate::Always { value: true } },
                vec!["f2".to_string()],
            ),
            IntentNode::new(
                "f2",
                IntentKind::Filter { predicate: Predicate::Always { value: true } },
                vec!["f1".to_string()],
            ),
        ],
        vec!["f1"],
    );
    // Reassign inputs to guarantee a cycle regardless of construction order.
    program.nodes[0].inputs = vec!["f2".to_string()];
    program.nodes[1].inputs = vec!["f1".to_string()];

    let report = program.ir().validate();
    assert!(!report.is_valid());
    assert!(report.issues.iter().any(|i| matches!(i, ioc::ir::ValidationIssue::Cycle)));
}

#[test]
fn join_node_runs_through_interpreter() {
    let program = empty_program(
        vec![
            IntentNode::new("left", IntentKind::Input { name: "left".to_string(), type_hint: None }, vec![]),
            IntentNode::new("right", IntentKind::Input { name: "right".to_string(), type_hint: None }, vec![]),
            IntentNode::new(
                "j",
                IntentKind::Join {
                    left_key: Transform::property(vec!["id".to_string()]).unwrap(),
                    right_key: Transform::property(vec!["id".to_string()]).unwrap(),
                    join_type: JoinType::Inner,
                },
                vec!["left".to_string(), "right".to_string()],
            ),
            IntentNode::new("out", IntentKind::Output, vec!["j".to_string()]),
        ],
        vec!["out"],
    );

    fn row(id: f64) -> Value {
        Value::Object(vec![("id".to_string(), Value::Number(id))])
    }

    let mut inputs = HashMap::new();
    inputs.insert("left".to_string(), vec![row(1.0), row(2.0)]);
    inputs.insert("right".to_string(), vec![row(2.0), row(3.0)]);

    let config = CompilerConfig::default();
    let result = run_program(&program, &inputs, &config.budget).unwrap();
    let out = result.get("out").unwrap().clone().into_collection();
    assert_eq!(out.len(), 1);

    let join_kind = &program.nodes[2].kind;
    assert_eq!(
        ioc::capability::derive_capability(join_kind).max_complexity,
        ComplexityClass::Quadratic
    );
}
