//! Operator semantics: literal comparison against resolved JSON values.
//!
//! Equality is type-aware with a few deliberate coercions: mixed
//! integer/float comparisons go through f64, and timestamp literals are
//! compared as instants against RFC 3339 strings. Ordering is defined for
//! numbers and timestamps only; anything else is unordered and therefore
//! never matches an ordering operator.

use std::cmp::Ordering;

use chrono::DateTime;
use regex::Regex;
use serde_json::{Number, Value};

use crate::parser::{ComparisonOp, Literal};

/// Deep equality of a resolved value against a literal.
pub(crate) fn equals_literal(actual: &Value, expected: &Literal) -> bool {
    match expected {
        Literal::Str(s) => actual.as_str() == Some(s.as_str()),
        Literal::Int(i) => match actual {
            Value::Number(n) => n.as_i64() == Some(*i) || n.as_f64() == Some(*i as f64),
            _ => false,
        },
        Literal::Float(x) => actual.as_f64() == Some(*x),
        Literal::Bool(b) => actual.as_bool() == Some(*b),
        Literal::Timestamp(ts) => match (actual.as_str(), DateTime::parse_from_rfc3339(ts)) {
            (Some(actual_str), Ok(expected_time)) => {
                match DateTime::parse_from_rfc3339(actual_str) {
                    Ok(actual_time) => actual_time == expected_time,
                    Err(_) => false,
                }
            }
            _ => false,
        },
        // hex and binary literals compare against the projected string form
        Literal::Hex(h) => actual.as_str() == Some(h.as_str()),
        Literal::Binary(b) => actual.as_str() == Some(b.as_str()),
    }
}

/// True when `actual` and the literal are ordered and the ordering
/// satisfies `op`. Absent or non-orderable operands never match.
pub(crate) fn ordering_matches(actual: &Value, expected: &Literal, op: ComparisonOp) -> bool {
    let Some(ordering) = partial_order(actual, expected) else {
        return false;
    };
    match op {
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Ge => ordering != Ordering::Less,
        ComparisonOp::Le => ordering != Ordering::Greater,
        _ => false,
    }
}

fn partial_order(actual: &Value, expected: &Literal) -> Option<Ordering> {
    match expected {
        Literal::Int(i) => actual.as_f64()?.partial_cmp(&(*i as f64)),
        Literal::Float(x) => actual.as_f64()?.partial_cmp(x),
        Literal::Timestamp(ts) => {
            let expected_time = DateTime::parse_from_rfc3339(ts).ok()?;
            let actual_time = DateTime::parse_from_rfc3339(actual.as_str()?).ok()?;
            Some(actual_time.cmp(&expected_time))
        }
        _ => None,
    }
}

/// Translate a SQL-style LIKE pattern (`%` any run, `_` one character)
/// into an anchored regex for full-string matching.
pub(crate) fn like_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

/// Anchor a user-supplied regex so MATCHES is a full-string match.
pub(crate) fn anchored_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

/// Convert a literal to its JSON projection for set comparisons.
pub(crate) fn literal_to_json(lit: &Literal) -> Value {
    match lit {
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Int(i) => Value::Number(Number::from(*i)),
        Literal::Float(x) => Number::from_f64(*x).map_or(Value::Null, Value::Number),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Timestamp(t) => Value::String(t.clone()),
        Literal::Hex(h) => Value::String(h.clone()),
        Literal::Binary(b) => Value::String(b.clone()),
    }
}

/// View a resolved value as a set of scalars: arrays contribute their
/// elements, everything else is a singleton.
pub(crate) fn scalar_elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(arr) => arr.iter().collect(),
        other => vec![other],
    }
}

/// Every element of `smaller` occurs in `larger` (`null == null` holds).
pub(crate) fn is_subset(smaller: &[&Value], larger: &[Value]) -> bool {
    smaller
        .iter()
        .all(|a| larger.iter().any(|b| **a == *b))
}

/// Every element of `literal` occurs in the resolved `elements`.
pub(crate) fn is_superset(elements: &[&Value], literal: &[Value]) -> bool {
    literal
        .iter()
        .all(|b| elements.iter().any(|a| **a == *b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_equality() {
        assert!(equals_literal(&json!("a.exe"), &Literal::Str("a.exe".into())));
        assert!(!equals_literal(&json!("b.exe"), &Literal::Str("a.exe".into())));
        assert!(!equals_literal(&json!(42), &Literal::Str("42".into())));
    }

    #[test]
    fn numeric_equality_coerces_int_and_float() {
        assert!(equals_literal(&json!(200), &Literal::Int(200)));
        assert!(equals_literal(&json!(200.0), &Literal::Int(200)));
        assert!(equals_literal(&json!(200), &Literal::Float(200.0)));
        assert!(!equals_literal(&json!(200.5), &Literal::Int(200)));
    }

    #[test]
    fn timestamp_equality_compares_instants() {
        let lit = Literal::Timestamp("2020-01-01T00:00:00Z".into());
        assert!(equals_literal(&json!("2020-01-01T00:00:00.000Z"), &lit));
        assert!(equals_literal(&json!("2020-01-01T01:00:00+01:00"), &lit));
        assert!(!equals_literal(&json!("2020-01-01T00:00:01Z"), &lit));
        assert!(!equals_literal(&json!("not a time"), &lit));
    }

    #[test]
    fn ordering_numeric_and_temporal_only() {
        assert!(ordering_matches(&json!(200), &Literal::Int(100), ComparisonOp::Gt));
        assert!(ordering_matches(&json!(100), &Literal::Int(100), ComparisonOp::Ge));
        assert!(!ordering_matches(&json!(50), &Literal::Int(100), ComparisonOp::Gt));
        // strings are not ordered
        assert!(!ordering_matches(
            &json!("zzz"),
            &Literal::Str("aaa".into()),
            ComparisonOp::Gt
        ));
        // temporal ordering
        assert!(ordering_matches(
            &json!("2020-06-01T00:00:00Z"),
            &Literal::Timestamp("2020-01-01T00:00:00Z".into()),
            ComparisonOp::Gt
        ));
    }

    #[test]
    fn like_translates_wildcards() {
        let re = like_regex("mal%").unwrap();
        assert!(re.is_match("malware.exe"));
        assert!(!re.is_match("good.exe"));
        // not a substring match
        assert!(!re.is_match("not-mal"));

        let re = like_regex("a_c").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("abbc"));

        // regex metacharacters in the pattern are literal
        let re = like_regex("a.b%").unwrap();
        assert!(re.is_match("a.bc"));
        assert!(!re.is_match("axbc"));
    }

    #[test]
    fn matches_is_full_string() {
        let re = anchored_regex("mal.*").unwrap();
        assert!(re.is_match("malware"));
        assert!(!re.is_match("xmalware"));
    }

    #[test]
    fn subset_and_superset_on_scalars() {
        let resolved = json!(["tcp", "http"]);
        let elements = scalar_elements(&resolved);
        let literal = vec![json!("ipv4"), json!("tcp"), json!("http")];
        assert!(is_subset(&elements, &literal));
        assert!(!is_superset(&elements, &literal));

        let scalar = json!("tcp");
        let elements = scalar_elements(&scalar);
        assert!(is_subset(&elements, &literal));
    }
}
