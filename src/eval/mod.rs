//! Tree-walking evaluation of compiled patterns against observable records.
//!
//! The per-call [`EvaluationContext`] is built fresh for every record and
//! passed by reference through the walk; no evaluator state survives a
//! call, so evaluation is safe to run concurrently across records.
//!
//! Faults during evaluation (unparsable paths, bad regexes, wrong operand
//! shapes) are logged and converted to non-matches at the comparison
//! boundary; nothing here can propagate an error to the caller.

pub mod compare;

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::parser::{
    parse_path, ComparisonOp, CompoundOp, Literal, ObjectPath, PathComponent, PathParseError,
    PatternExpr,
};
use crate::pattern::{compile, CompiledPattern};

/// Ephemeral mapping from observable-type name to the candidate record's
/// structured projection. One per `evaluate` call; never shared.
pub struct EvaluationContext<'a> {
    objects: HashMap<&'a str, &'a Value>,
}

impl<'a> EvaluationContext<'a> {
    /// Key the record under its own declared `"type"` field. Records
    /// without one produce an empty context (nothing can match).
    pub fn from_record(record: &'a Value) -> Self {
        let mut objects = HashMap::new();
        match record.get("type").and_then(Value::as_str) {
            Some(type_name) => {
                objects.insert(type_name, record);
            }
            None => log::debug!("record has no 'type' field; nothing will match"),
        }
        EvaluationContext { objects }
    }

    pub fn object(&self, type_name: &str) -> Option<&'a Value> {
        self.objects.get(type_name).copied()
    }
}

#[derive(Debug, Error)]
pub(crate) enum EvalFault {
    #[error(transparent)]
    Path(#[from] PathParseError),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("operator {op} expected a single literal operand")]
    ExpectedLiteral { op: ComparisonOp },

    #[error("operator {op} expected a parenthesized set literal")]
    ExpectedSet { op: ComparisonOp },

    #[error("operator {op} expected a string operand")]
    ExpectedString { op: ComparisonOp },

    #[error("comparison is missing its right-hand operand")]
    MissingOperand,
}

/// Compile `pattern` and test it against a single record. Compilation
/// failures are logged and yield `false`.
pub fn evaluate(pattern: &str, record: &Value) -> bool {
    let compiled = compile(pattern);
    if !compiled.is_valid() {
        log::debug!(
            "pattern {:?} failed to compile with {} error(s)",
            pattern,
            compiled.errors().len()
        );
        return false;
    }
    evaluate_compiled(&compiled, record)
}

/// Test an already-compiled pattern against a single record.
pub fn evaluate_compiled(compiled: &CompiledPattern, record: &Value) -> bool {
    let Some(ast) = compiled.ast() else {
        return false;
    };
    let ctx = EvaluationContext::from_record(record);
    eval_expr(ast, &ctx)
}

/// Compile once and filter a collection, keeping records the pattern
/// matches. Each record is evaluated with its own isolated context.
pub fn matching_records<'a, I>(pattern: &str, records: I) -> Vec<&'a Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let compiled = compile(pattern);
    if !compiled.is_valid() {
        log::debug!(
            "pattern {:?} failed to compile with {} error(s)",
            pattern,
            compiled.errors().len()
        );
        return Vec::new();
    }
    records
        .into_iter()
        .filter(|record| evaluate_compiled(&compiled, record))
        .collect()
}

fn eval_expr(expr: &PatternExpr, ctx: &EvaluationContext<'_>) -> bool {
    match expr {
        PatternExpr::Observation(inner) => eval_expr(inner, ctx),

        PatternExpr::Compound { op, left, right } => {
            let l = eval_expr(left, ctx);
            let r = eval_expr(right, ctx);
            match op {
                // single-record evaluation carries no event ordering, so
                // FOLLOWEDBY degrades to conjunction
                CompoundOp::And | CompoundOp::FollowedBy => l && r,
                CompoundOp::Or => l || r,
            }
        }

        // temporal/repetition qualifiers are validated but not enforced
        // against a single record; delegate to the wrapped observation
        PatternExpr::Qualified { observation, .. } => eval_expr(observation, ctx),

        PatternExpr::Comparison {
            path,
            negated,
            op,
            value,
        } => match eval_comparison(path, *op, value.as_deref(), ctx) {
            Ok(matched) => matched != *negated,
            Err(fault) => {
                log::warn!("evaluation fault for '{}': {}", path, fault);
                false
            }
        },

        PatternExpr::Literal(_) | PatternExpr::List(_) => {
            log::warn!("literal in expression position; treating as non-match");
            false
        }
    }
}

fn eval_comparison(
    path: &ObjectPath,
    op: ComparisonOp,
    value: Option<&PatternExpr>,
    ctx: &EvaluationContext<'_>,
) -> Result<bool, EvalFault> {
    let components = parse_path(&path.property_path)?;
    let resolved = match ctx.object(&path.object_type) {
        Some(root) => navigate(root, &components),
        None => Vec::new(),
    };

    if op == ComparisonOp::Exists {
        return Ok(!resolved.is_empty());
    }
    let value = value.ok_or(EvalFault::MissingOperand)?;

    match op {
        ComparisonOp::Eq | ComparisonOp::Neq => {
            let literal = as_literal(value, op)?;
            let eq = resolved.iter().any(|v| compare::equals_literal(v, literal));
            Ok(if op == ComparisonOp::Neq { !eq } else { eq })
        }

        ComparisonOp::Gt | ComparisonOp::Lt | ComparisonOp::Ge | ComparisonOp::Le => {
            let literal = as_literal(value, op)?;
            Ok(resolved
                .iter()
                .any(|v| compare::ordering_matches(v, literal, op)))
        }

        ComparisonOp::In => {
            let items = as_literal_list(value, op)?;
            Ok(resolved
                .iter()
                .any(|v| items.iter().any(|lit| compare::equals_literal(v, lit))))
        }

        ComparisonOp::Like => {
            let pattern = as_string_literal(value, op)?;
            let re = compare::like_regex(pattern)?;
            Ok(resolved
                .iter()
                .any(|v| v.as_str().is_some_and(|s| re.is_match(s))))
        }

        ComparisonOp::Matches => {
            let pattern = as_string_literal(value, op)?;
            let re = compare::anchored_regex(pattern)?;
            Ok(resolved
                .iter()
                .any(|v| v.as_str().is_some_and(|s| re.is_match(s))))
        }

        ComparisonOp::IsSubset | ComparisonOp::IsSuperset => {
            let literal_set = literal_elements(value, op)?;
            Ok(resolved.iter().any(|v| {
                let value_set = compare::scalar_elements(v);
                match op {
                    ComparisonOp::IsSubset => compare::is_subset(&value_set, &literal_set),
                    _ => compare::is_superset(&value_set, &literal_set),
                }
            }))
        }

        ComparisonOp::Exists => unreachable!("handled above"),
    }
}

/// Resolve a property path against one object projection. Wildcards fan
/// out to every element; the result is every value the path reaches.
fn navigate<'v>(root: &'v Value, path: &[PathComponent]) -> Vec<&'v Value> {
    let mut current = vec![root];

    for component in path {
        if current.is_empty() {
            return Vec::new();
        }

        let mut next = Vec::new();
        match component {
            PathComponent::Key(key) => {
                for value in current {
                    if let Some(field) = value.get(key.as_str()) {
                        next.push(field);
                    }
                }
            }
            PathComponent::Index(idx) => {
                for value in current {
                    if let Value::Array(arr) = value {
                        if let Some(element) = arr.get(*idx) {
                            next.push(element);
                        }
                    }
                }
            }
            PathComponent::AnyIndex => {
                for value in current {
                    if let Value::Array(arr) = value {
                        next.extend(arr.iter());
                    }
                }
            }
        }
        current = next;
    }

    current
}

fn as_literal<'e>(value: &'e PatternExpr, op: ComparisonOp) -> Result<&'e Literal, EvalFault> {
    match value {
        PatternExpr::Literal(lit) => Ok(lit),
        _ => Err(EvalFault::ExpectedLiteral { op }),
    }
}

fn as_string_literal(value: &PatternExpr, op: ComparisonOp) -> Result<&str, EvalFault> {
    match as_literal(value, op)? {
        Literal::Str(s) => Ok(s),
        _ => Err(EvalFault::ExpectedString { op }),
    }
}

fn as_literal_list<'e>(
    value: &'e PatternExpr,
    op: ComparisonOp,
) -> Result<Vec<&'e Literal>, EvalFault> {
    match value {
        PatternExpr::List(items) => items
            .iter()
            .map(|item| as_literal(item, op))
            .collect(),
        _ => Err(EvalFault::ExpectedSet { op }),
    }
}

/// Elements of the literal side of a set comparison: a set literal yields
/// its members, a scalar literal a singleton.
fn literal_elements(value: &PatternExpr, op: ComparisonOp) -> Result<Vec<Value>, EvalFault> {
    match value {
        PatternExpr::List(items) => items
            .iter()
            .map(|item| as_literal(item, op).map(compare::literal_to_json))
            .collect(),
        PatternExpr::Literal(lit) => Ok(vec![compare::literal_to_json(lit)]),
        _ => Err(EvalFault::ExpectedSet { op }),
    }
}
