//! # Security Validator
//!
//! Applied at every boundary where external bytes enter: deserialization
//! and predicate/transform compilation. Enforces the size caps, property
//! whitelist, and regex/code-shape guards from §3's invariants 4–7 and §4.4.

use regex::Regex;

use crate::config::CompilerConfig;
use crate::dsl::{Predicate, Transform};
use crate::error::IocError;
use crate::ir::{IntentKind, Program};
use crate::value::{validate_value, FORBIDDEN_PROPERTY_SEGMENTS};

/// Nested-quantifier patterns rejected by invariant 6, regardless of where
/// in the regex they occur.
const FORBIDDEN_REGEX_SHAPES: &[&str] = &["*+", "+*", "**", "++", "*{", "+{"];

/// Disallowed substrings in generated code, per §4.4.
pub const FORBIDDEN_CODE_SHAPES: &[&str] = &[
    "eval(",
    "new Function(",
    "require(",
    "import(",
    "process.",
    "global.",
    "globalThis.",
    "__proto__",
    "prototype.",
];

const MAX_REGEX_LENGTH: usize = 1000;

fn identifier_pattern() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("static pattern is valid"))
}

/// Check a single property path segment against invariant 5: no forbidden
/// name, and it must match `[A-Za-z_$][A-Za-z0-9_$]*`.
pub fn validate_property_segment(segment: &str) -> Result<(), IocError> {
    if FORBIDDEN_PROPERTY_SEGMENTS.contains(&segment) {
        return Err(IocError::UnsafeValue {
            detail: format!("property segment '{segment}' is forbidden"),
        });
    }
    if !identifier_pattern().is_match(segment) {
        return Err(IocError::UnsafeValue {
            detail: format!("property segment '{segment}' is not a legal identifier"),
        });
    }
    Ok(())
}

/// Check a regex literal against invariant 6: compiles, length ≤ 1000, no
/// nested-quantifier shapes.
pub fn validate_regex_literal(pattern: &str) -> Result<(), IocError> {
    if pattern.len() > MAX_REGEX_LENGTH {
        return Err(IocError::UnsafeValue {
            detail: format!("regex literal exceeds {MAX_REGEX_LENGTH} characters"),
        });
    }
    for shape in FORBIDDEN_REGEX_SHAPES {
        if pattern.contains(shape) {
            return Err(IocError::UnsafeValue {
                detail: format!("regex literal contains forbidden nested-quantifier shape '{shape}'"),
            });
        }
    }
    Regex::new(pattern).map_err(|e| IocError::UnsafeValue {
        detail: format!("regex literal does not compile: {e}"),
    })?;
    Ok(())
}

/// Recursively validate a predicate tree: every literal is a legal `Value`,
/// every `matches` regex is shape-safe, every `CompareProperty` identifier
/// is a legal segment.
pub fn validate_predicate(p: &Predicate) -> Result<(), IocError> {
    match p {
        Predicate::Compare { op, literal } => {
            validate_value(literal)?;
            if matches!(op, crate::dsl::CompareOp::Matches) {
                if let crate::value::Value::String(pattern) = literal {
                    validate_regex_literal(pattern)?;
                }
            }
            Ok(())
        }
        Predicate::CompareProperty {
            identifier, literal, ..
        } => {
            validate_property_segment(identifier)?;
            validate_value(literal)
        }
        Predicate::TypeCheck { .. } | Predicate::Always { .. } => Ok(()),
        Predicate::And { list } | Predicate::Or { list } => {
            for inner in list {
                validate_predicate(inner)?;
            }
            Ok(())
        }
        Predicate::Not { inner } => validate_predicate(inner),
    }
}

/// Recursively validate a transform tree: every literal is legal, every
/// `Property` path segment is legal, every nested `matches` regex is
/// shape-safe.
pub fn validate_transform(t: &Transform) -> Result<(), IocError> {
    match t {
        Transform::Identity => Ok(()),
        Transform::Constant { value } => validate_value(value),
        Transform::Property { path } => {
            if path.is_empty() {
                return Err(IocError::UnsafeValue {
                    detail: "Property path must be non-empty".to_string(),
                });
            }
            for segment in path {
                validate_property_segment(segment)?;
            }
            Ok(())
        }
        Transform::Arithmetic { operand, .. } => {
            if let Some(v) = operand {
                validate_value(v)?;
            }
            Ok(())
        }
        Transform::String { args, .. } | Transform::Array { args, .. } => {
            for v in args {
                validate_value(v)?;
            }
            Ok(())
        }
        Transform::Conditional {
            predicate,
            if_true,
            if_false,
        } => {
            validate_predicate(predicate)?;
            validate_transform(if_true)?;
            validate_transform(if_false)
        }
        Transform::Compose { list } => {
            for inner in list {
                validate_transform(inner)?;
            }
            Ok(())
        }
        Transform::Construct { fields } => {
            for (_, inner) in fields {
                validate_transform(inner)?;
            }
            Ok(())
        }
    }
}

fn validate_node_params(kind: &IntentKind) -> Result<(), IocError> {
    match kind {
        IntentKind::Constant { value } => validate_value(value),
        IntentKind::Filter { predicate } => validate_predicate(predicate),
        IntentKind::Map { transform } => validate_transform(transform),
        IntentKind::Reduce { reduction, initial } => {
            if let Some(v) = initial {
                validate_value(v)?;
            }
            if let crate::dsl::Reduction::Any { predicate } | crate::dsl::Reduction::All { predicate } =
                reduction
            {
                validate_predicate(predicate)?;
            }
            Ok(())
        }
        IntentKind::Sort { key_transform, .. } | IntentKind::Distinct { key_transform } => {
            if let Some(t) = key_transform {
                validate_transform(t)?;
            }
            Ok(())
        }
        IntentKind::GroupBy { key_transform } => validate_transform(key_transform),
        IntentKind::Join {
            left_key, right_key, ..
        } => {
            validate_transform(left_key)?;
            validate_transform(right_key)
        }
        IntentKind::Input { .. }
        | IntentKind::Flatten { .. }
        | IntentKind::Slice { .. }
        | IntentKind::Concat
        | IntentKind::Output => Ok(()),
    }
}

/// Full boundary validation of a deserialized program: size caps, node
/// count cap, version prefix, and invariants 4–6 over every node. Invariant
/// 7's serialized-size cap is checked by the caller against the raw bytes
/// before this function is reached (see [`Program::from_json_bytes`]
/// callers); this function checks the node-count half of invariant 7 plus
/// 4–6.
pub fn validate_program(program: &Program, config: &CompilerConfig) -> Result<(), IocError> {
    if !program.version.starts_with("1.") {
        tracing::warn!(version = %program.version, "program rejected: unsupported version");
        return Err(IocError::InvalidProgram {
            reasons: vec![format!(
                "unsupported version '{}', expected a 1.x program",
                program.version
            )],
        });
    }
    if program.nodes.len() > config.max_nodes {
        tracing::warn!(node_count = program.nodes.len(), cap = config.max_nodes, "program rejected: node count cap exceeded");
        return Err(IocError::InvalidProgram {
            reasons: vec![format!(
                "program has {} nodes, exceeding the cap of {}",
                program.nodes.len(),
                config.max_nodes
            )],
        });
    }
    let mut reasons = Vec::new();
    for node in &program.nodes {
        if let Err(e) = validate_node_params(&node.kind) {
            reasons.push(format!("node '{}': {e}", node.id));
        }
    }
    if !reasons.is_empty() {
        tracing::warn!(reason_count = reasons.len(), "program rejected: structural validation failed");
        return Err(IocError::InvalidProgram { reasons });
    }
    Ok(())
}

/// Check serialized byte size against invariant 7's 10 MiB cap.
pub fn validate_serialized_size(bytes: &[u8], config: &CompilerConfig) -> Result<(), IocError> {
    if bytes.len() > config.max_serialized_bytes {
        return Err(IocError::InvalidProgram {
            reasons: vec![format!(
                "serialized program is {} bytes, exceeding the cap of {}",
                bytes.len(),
                config.max_serialized_bytes
            )],
        });
    }
    Ok(())
}

/// Check generated code against §4.4/§4.8's size cap and disallowed shapes.
/// Called by the code generator immediately after composing the program
/// function's source representation.
pub fn validate_generated_code(source: &str, config: &CompilerConfig) -> Result<(), IocError> {
    if source.len() > config.max_generated_code_bytes {
        return Err(IocError::CompilationError {
            node_id: None,
            detail: format!(
                "generated code is {} bytes, exceeding the cap of {}",
                source.len(),
                config.max_generated_code_bytes
            ),
        });
    }
    for shape in FORBIDDEN_CODE_SHAPES {
        if source.contains(shape) {
            return Err(IocError::CompilationError {
                node_id: None,
                detail: format!("generated code contains disallowed shape '{shape}'"),
            });
        }
    }
    Ok(())
}

/// Sanitize an identifier that will flow into generated code: replace
/// non-alphanumerics with underscores and ensure it begins with a letter or
/// underscore. Used by the code generator (§4.8) for every identifier
/// derived from user-controlled program content (node ids, property names).
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || !out.chars().next().unwrap().is_ascii_alphabetic() && !out.starts_with('_') {
        out.insert(0, '_');
    }
    out
}

/// Escape a string for use inside a generated string literal.
pub fn escape_string_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text destined for a generated comment so it cannot contain an
/// early block-comment terminator.
pub fn escape_comment(raw: &str) -> String {
    raw.replace("*/", "* /")
}
