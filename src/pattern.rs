//! Compilation entry point and the immutable [`CompiledPattern`] result.

use std::collections::BTreeSet;

use crate::parser::{self, lexer, PatternExpr, SyntaxError};

/// The result of one `compile` call. Immutable after construction: either
/// a usable AST (no errors) or an ordered list of positioned syntax errors.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPattern {
    pattern: String,
    ast: Option<PatternExpr>,
    object_types: BTreeSet<String>,
    errors: Vec<SyntaxError>,
}

impl CompiledPattern {
    /// The original pattern text.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The parsed AST; `Some` iff compilation produced no errors.
    pub fn ast(&self) -> Option<&PatternExpr> {
        self.ast.as_ref()
    }

    /// Observable-type names referenced by the pattern, sorted.
    pub fn referenced_types(&self) -> &BTreeSet<String> {
        &self.object_types
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.ast.is_some()
    }

    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    /// Debug rendering of the AST as an indented tree, or a failure
    /// message when the pattern did not compile.
    pub fn render_ast(&self) -> String {
        match &self.ast {
            Some(ast) => ast.render_tree(),
            None => match self.errors.first() {
                Some(err) => format!("pattern failed to compile: {}", err),
                None => "pattern failed to compile".to_string(),
            },
        }
    }
}

/// Compile a pattern string. Never panics and never returns `Err`: all
/// failures, including empty input and arbitrary garbage, are represented
/// as [`SyntaxError`] entries on the result.
pub fn compile(pattern: &str) -> CompiledPattern {
    if pattern.trim().is_empty() {
        return CompiledPattern {
            pattern: pattern.to_string(),
            ast: None,
            object_types: BTreeSet::new(),
            errors: vec![SyntaxError::new(1, 1, "empty pattern")],
        };
    }

    let tokens = lexer::lex(pattern);
    let (ast, mut errors) = parser::parse(&tokens);

    // an AST produced alongside errors is partial; don't expose it
    let ast = if errors.is_empty() { ast } else { None };
    if ast.is_none() && errors.is_empty() {
        errors.push(SyntaxError::new(1, 1, "pattern did not produce an expression"));
    }

    let mut object_types = BTreeSet::new();
    if let Some(ast) = &ast {
        ast.collect_object_types(&mut object_types);
    }

    CompiledPattern {
        pattern: pattern.to_string(),
        ast,
        object_types,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_patterns_fail_without_lexing() {
        for input in ["", "   ", "\n\t "] {
            let compiled = compile(input);
            assert!(!compiled.is_valid());
            assert_eq!(compiled.errors().len(), 1);
            assert_eq!(compiled.errors()[0].line, 1);
            assert_eq!(compiled.errors()[0].column, 1);
        }
    }

    #[test]
    fn valid_pattern_exposes_ast_and_types() {
        let compiled = compile("[file:name = 'a.exe' AND network-traffic:dst_port = 443]");
        assert!(compiled.is_valid());
        assert!(compiled.ast().is_some());
        assert_eq!(
            compiled
                .referenced_types()
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>(),
            vec!["file", "network-traffic"]
        );
    }

    #[test]
    fn invalid_pattern_has_no_ast() {
        let compiled = compile("[file:name = ");
        assert!(!compiled.is_valid());
        assert!(compiled.ast().is_none());
        assert!(!compiled.errors().is_empty());
        assert!(compiled.render_ast().contains("failed to compile"));
    }

    #[test]
    fn compiling_twice_is_deterministic() {
        let a = compile("[file:name LIKE 'mal%'] WITHIN 5 MINUTES");
        let b = compile("[file:name LIKE 'mal%'] WITHIN 5 MINUTES");
        assert_eq!(a.ast(), b.ast());
        assert_eq!(a, b);
    }
}
