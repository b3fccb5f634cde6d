//! Semantic validation of compiled pattern ASTs.
//!
//! All violations are collected before returning; the result is valid only
//! when the error list is empty.

use crate::parser::{parse_path, ComparisonOp, PatternExpr, Qualifier};

/// STIX cyber observable types legal on the left of a comparison.
pub const OBSERVABLE_TYPES: &[&str] = &[
    "artifact",
    "autonomous-system",
    "directory",
    "domain-name",
    "email-addr",
    "email-message",
    "file",
    "ipv4-addr",
    "ipv6-addr",
    "mac-addr",
    "mutex",
    "network-traffic",
    "process",
    "software",
    "url",
    "user-account",
    "windows-registry-key",
    "x509-certificate",
];

pub fn is_known_observable_type(name: &str) -> bool {
    OBSERVABLE_TYPES.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// Human-readable summary, one line per violation.
    pub fn message(&self) -> String {
        if self.valid {
            "pattern is valid".to_string()
        } else {
            self.errors.join("\n")
        }
    }
}

/// Validate a compiled AST. Collects every violation instead of stopping
/// at the first.
pub fn validate_ast(expr: &PatternExpr) -> ValidationResult {
    let mut errors = Vec::new();
    check(expr, &mut errors);
    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

/// True for nodes legal directly inside an observation's brackets.
fn comparison_shaped(expr: &PatternExpr) -> bool {
    match expr {
        PatternExpr::Comparison { .. } => true,
        PatternExpr::Compound { left, right, .. } => {
            comparison_shaped(left) && comparison_shaped(right)
        }
        _ => false,
    }
}

fn check(expr: &PatternExpr, errors: &mut Vec<String>) {
    match expr {
        PatternExpr::Observation(inner) => {
            if !comparison_shaped(inner) {
                errors.push("observation must wrap a comparison expression".to_string());
            }
            check(inner, errors);
        }

        PatternExpr::Comparison {
            path,
            op,
            value,
            negated: _,
        } => {
            if !is_known_observable_type(&path.object_type) {
                errors.push(format!(
                    "unknown observable type '{}'",
                    path.object_type
                ));
            }
            if path.property_path.is_empty() {
                errors.push(format!(
                    "object path '{}:' has an empty property path",
                    path.object_type
                ));
            } else if let Err(e) = parse_path(&path.property_path) {
                errors.push(format!("invalid property path '{}': {}", path, e));
            }

            match (op, value) {
                (ComparisonOp::Exists, Some(_)) => {
                    errors.push("EXISTS does not take a right-hand value".to_string());
                }
                (ComparisonOp::Exists, None) => {}
                (_, None) => {
                    errors.push(format!(
                        "comparison '{} {}' is missing its right-hand value",
                        path, op
                    ));
                }
                (op, Some(value)) => {
                    match value.as_ref() {
                        PatternExpr::Literal(_) => {
                            if *op == ComparisonOp::In {
                                errors.push(format!(
                                    "IN on '{}' requires a parenthesized set literal",
                                    path
                                ));
                            }
                        }
                        PatternExpr::List(_) => {}
                        other => {
                            errors.push(format!(
                                "comparison value must be a literal or set, found {:?}",
                                node_kind(other)
                            ));
                        }
                    }
                    check(value, errors);
                }
            }
        }

        PatternExpr::Compound { left, right, .. } => {
            check(left, errors);
            check(right, errors);
        }

        PatternExpr::Literal(_) => {}

        PatternExpr::List(items) => {
            if items.is_empty() {
                errors.push("set literal must not be empty".to_string());
            }
            for item in items {
                if !matches!(item, PatternExpr::Literal(_)) {
                    errors.push(format!(
                        "set literal may only contain literals, found {:?}",
                        node_kind(item)
                    ));
                }
                check(item, errors);
            }
        }

        PatternExpr::Qualified {
            observation,
            qualifier,
            value,
        } => {
            check(observation, errors);
            check_qualifier_value(*qualifier, value, errors);
        }
    }
}

fn check_qualifier_value(qualifier: Qualifier, value: &str, errors: &mut Vec<String>) {
    match qualifier {
        Qualifier::Within => {
            let valid = match value.split_once(' ') {
                Some((amount, unit)) => {
                    positive_int(amount)
                        && matches!(
                            unit,
                            "SECOND"
                                | "SECONDS"
                                | "MINUTE"
                                | "MINUTES"
                                | "HOUR"
                                | "HOURS"
                                | "DAY"
                                | "DAYS"
                        )
                }
                None => false,
            };
            if !valid {
                errors.push(format!(
                    "WITHIN qualifier '{}' must be a positive integer followed by \
                     SECONDS, MINUTES, HOURS, or DAYS",
                    value
                ));
            }
        }
        Qualifier::Repeats => {
            if !positive_int(value) {
                errors.push(format!(
                    "REPEATS qualifier '{}' must be a positive integer",
                    value
                ));
            }
        }
        Qualifier::Start | Qualifier::Stop => {
            if chrono::DateTime::parse_from_rfc3339(value).is_err() {
                errors.push(format!(
                    "{} qualifier '{}' is not a valid RFC 3339 timestamp",
                    qualifier, value
                ));
            }
        }
    }
}

fn positive_int(s: &str) -> bool {
    matches!(s.parse::<i64>(), Ok(n) if n > 0)
}

fn node_kind(expr: &PatternExpr) -> &'static str {
    match expr {
        PatternExpr::Observation(_) => "Observation",
        PatternExpr::Comparison { .. } => "Comparison",
        PatternExpr::Compound { .. } => "Compound",
        PatternExpr::Literal(_) => "Literal",
        PatternExpr::List(_) => "List",
        PatternExpr::Qualified { .. } => "Qualified",
    }
}
