//! Tagged-variant AST for compiled STIX patterns.
//!
//! Nodes are immutable once constructed; equality is structural. The
//! evaluator and validator dispatch by exhaustive match over these
//! variants, so adding a variant is a compile error everywhere it matters.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Write};

/// Comparison operators recognized by the pattern grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    Like,
    Matches,
    IsSubset,
    IsSuperset,
    Exists,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Le => "<=",
            ComparisonOp::In => "IN",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::Matches => "MATCHES",
            ComparisonOp::IsSubset => "ISSUBSET",
            ComparisonOp::IsSuperset => "ISSUPERSET",
            ComparisonOp::Exists => "EXISTS",
        }
    }
}

impl Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Binary connectives between expressions. `FOLLOWEDBY` only appears
/// between observation expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompoundOp {
    And,
    Or,
    FollowedBy,
}

impl Display for CompoundOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompoundOp::And => "AND",
            CompoundOp::Or => "OR",
            CompoundOp::FollowedBy => "FOLLOWEDBY",
        };
        write!(f, "{}", s)
    }
}

/// Trailing qualifiers on an observation expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier {
    Within,
    Repeats,
    Start,
    Stop,
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Qualifier::Within => "WITHIN",
            Qualifier::Repeats => "REPEATS",
            Qualifier::Start => "START",
            Qualifier::Stop => "STOP",
        };
        write!(f, "{}", s)
    }
}

/// Literal forms from the grammar. Timestamp, hex, and binary literals
/// keep their source text; the evaluator interprets them lazily.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Inner text of a `t'...'` literal (no quotes, no `t` prefix).
    Timestamp(String),
    /// Inner text of an `h'...'` literal.
    Hex(String),
    /// Inner text of a `b'...'` literal.
    Binary(String),
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "'{}'", s),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Timestamp(t) => write!(f, "t'{}'", t),
            Literal::Hex(h) => write!(f, "h'{}'", h),
            Literal::Binary(b) => write!(f, "b'{}'", b),
        }
    }
}

/// Left-hand side of a comparison: `observable-type:property.path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    pub object_type: String,
    pub property_path: String,
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.property_path)
    }
}

/// A compiled pattern expression.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternExpr {
    /// `[ comparison-expression ]`
    Observation(Box<PatternExpr>),
    /// `path [NOT] op value`; `value` is `None` only for `EXISTS`.
    Comparison {
        path: ObjectPath,
        negated: bool,
        op: ComparisonOp,
        value: Option<Box<PatternExpr>>,
    },
    Compound {
        op: CompoundOp,
        left: Box<PatternExpr>,
        right: Box<PatternExpr>,
    },
    Literal(Literal),
    /// Parenthesized set literal, e.g. `('a', 'b')`.
    List(Vec<PatternExpr>),
    /// Observation expression with a trailing qualifier. `START t'..' STOP
    /// t'..'` parses as two nested layers.
    Qualified {
        observation: Box<PatternExpr>,
        qualifier: Qualifier,
        value: String,
    },
}

impl PatternExpr {
    pub fn compound(op: CompoundOp, left: PatternExpr, right: PatternExpr) -> Self {
        PatternExpr::Compound {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn observation(inner: PatternExpr) -> Self {
        PatternExpr::Observation(Box::new(inner))
    }

    pub fn qualified(observation: PatternExpr, qualifier: Qualifier, value: String) -> Self {
        PatternExpr::Qualified {
            observation: Box::new(observation),
            qualifier,
            value,
        }
    }

    /// Collect every observable-type name referenced by a comparison.
    pub fn collect_object_types(&self, out: &mut BTreeSet<String>) {
        match self {
            PatternExpr::Observation(inner) => inner.collect_object_types(out),
            PatternExpr::Comparison { path, .. } => {
                out.insert(path.object_type.clone());
            }
            PatternExpr::Compound { left, right, .. } => {
                left.collect_object_types(out);
                right.collect_object_types(out);
            }
            PatternExpr::Literal(_) => {}
            PatternExpr::List(items) => {
                for item in items {
                    item.collect_object_types(out);
                }
            }
            PatternExpr::Qualified { observation, .. } => observation.collect_object_types(out),
        }
    }

    /// Render the tree one node per line, two-space indent per level.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        match self {
            PatternExpr::Observation(inner) => {
                let _ = writeln!(out, "{}Observation", pad);
                inner.render_into(out, depth + 1);
            }
            PatternExpr::Comparison {
                path,
                negated,
                op,
                value,
            } => {
                let not = if *negated { "NOT " } else { "" };
                let _ = writeln!(out, "{}Comparison {}{} {}", pad, not, op, path);
                if let Some(value) = value {
                    value.render_into(out, depth + 1);
                }
            }
            PatternExpr::Compound { op, left, right } => {
                let _ = writeln!(out, "{}Compound {}", pad, op);
                left.render_into(out, depth + 1);
                right.render_into(out, depth + 1);
            }
            PatternExpr::Literal(lit) => {
                let _ = writeln!(out, "{}Literal {}", pad, lit);
            }
            PatternExpr::List(items) => {
                let _ = writeln!(out, "{}List", pad);
                for item in items {
                    item.render_into(out, depth + 1);
                }
            }
            PatternExpr::Qualified {
                observation,
                qualifier,
                value,
            } => {
                let _ = writeln!(out, "{}Qualified {} {}", pad, qualifier, value);
                observation.render_into(out, depth + 1);
            }
        }
    }
}
