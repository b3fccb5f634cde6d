//! Parser for the property-path portion of an object path.
//!
//! Handles paths like:
//! - `name` → [Key("name")]
//! - `hashes.'SHA-256'` → [Key("hashes"), Key("SHA-256")]
//! - `extensions.sections[*].entropy` → [Key("extensions"), Key("sections"), AnyIndex, Key("entropy")]

use pest::{iterators::Pair, Parser};
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "parser/object_path.pest"]
pub struct PathParser;

/// A single component in a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathComponent {
    /// Object field access: `.fieldname` or `.'quoted name'`
    Key(String),
    /// Array index access: `[3]`
    Index(usize),
    /// Array wildcard access: `[*]` — any element of the sequence
    AnyIndex,
}

/// Errors that can occur during path parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Syntax error from the Pest parser
    #[error("path syntax error: {0}")]
    Syntax(String),

    /// Invalid numeric index value
    #[error("invalid array index '{value}': {reason}")]
    InvalidIndex { value: String, reason: String },

    /// Empty path (no components)
    #[error("property path cannot be empty")]
    EmptyPath,
}

/// Parse a property path into a vector of components.
pub fn parse_path(input: &str) -> Result<Vec<PathComponent>, PathParseError> {
    if input.is_empty() {
        return Err(PathParseError::EmptyPath);
    }

    let pairs = PathParser::parse(Rule::path, input)
        .map_err(|e| PathParseError::Syntax(format!("failed to parse path '{}': {}", input, e)))?;

    let mut components = Vec::new();

    for pair in pairs {
        match pair.as_rule() {
            Rule::path => {
                for component_pair in pair.into_inner() {
                    if let Some(component) = parse_component(component_pair)? {
                        components.push(component);
                    }
                }
            }
            Rule::EOI => {}
            _ => {
                return Err(PathParseError::Syntax(format!(
                    "unexpected rule: {:?}",
                    pair.as_rule()
                )))
            }
        }
    }

    if components.is_empty() {
        return Err(PathParseError::EmptyPath);
    }

    Ok(components)
}

fn parse_component(pair: Pair<'_, Rule>) -> Result<Option<PathComponent>, PathParseError> {
    match pair.as_rule() {
        Rule::key_first | Rule::key_access => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| PathParseError::Syntax("missing key".to_string()))?;
            match inner.as_rule() {
                Rule::identifier => Ok(Some(PathComponent::Key(inner.as_str().to_string()))),
                Rule::quoted_key => {
                    let quoted = inner
                        .into_inner()
                        .next()
                        .ok_or_else(|| PathParseError::Syntax("missing key body".to_string()))?;
                    Ok(Some(PathComponent::Key(unescape(quoted.as_str()))))
                }
                rule => Err(PathParseError::Syntax(format!(
                    "unexpected key rule: {:?}",
                    rule
                ))),
            }
        }
        Rule::index_access => {
            let number_pair = pair
                .into_inner()
                .next()
                .ok_or_else(|| PathParseError::Syntax("missing index".to_string()))?;
            let number_str = number_pair.as_str();

            let index = number_str
                .parse::<usize>()
                .map_err(|e| PathParseError::InvalidIndex {
                    value: number_str.to_string(),
                    reason: e.to_string(),
                })?;

            Ok(Some(PathComponent::Index(index)))
        }
        Rule::wildcard_access => Ok(Some(PathComponent::AnyIndex)),
        _ => Ok(None),
    }
}

/// Strip `\'` and `\\` escapes inside a quoted key.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
