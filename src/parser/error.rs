use miette::{Diagnostic, SourceSpan};
use serde::Serialize;
use thiserror::Error;

/// A single positioned syntax error accumulated during compilation.
///
/// Positions are 1-based. Several of these can be produced by one
/// `compile` call thanks to parser error recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        SyntaxError {
            line,
            column,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

/// Rich diagnostic wrapper for CLI reporting via miette.
#[derive(Debug, Clone, Diagnostic, Error)]
pub enum PatternError {
    #[error("syntax error at line {line}, column {column}")]
    #[diagnostic(code(stix_pattern::syntax))]
    Syntax {
        #[source_code]
        src: String,
        #[label("{message}")]
        span: SourceSpan,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("pattern failed semantic validation")]
    #[diagnostic(
        code(stix_pattern::semantic),
        help("run with --ast to inspect the parsed tree")
    )]
    Semantic { message: String },
}

impl PatternError {
    /// Build a labeled syntax diagnostic from an accumulated error.
    pub fn from_syntax(err: &SyntaxError, src: &str) -> Self {
        let offset = byte_offset(src, err.line, err.column);
        // clamp to a 1-wide span so miette always renders an arrow
        let span = if offset >= src.len() && !src.is_empty() {
            (src.len() - 1, 1).into()
        } else if src.is_empty() {
            (0, 0).into()
        } else {
            (offset, 1).into()
        };
        PatternError::Syntax {
            src: src.to_string(),
            span,
            message: err.message.clone(),
            line: err.line,
            column: err.column,
        }
    }
}

/// Byte offset of a 1-based line/column position in `src`.
fn byte_offset(src: &str, line: usize, column: usize) -> usize {
    let mut current_line = 1;
    let mut current_col = 1;
    for (idx, c) in src.char_indices() {
        if current_line == line && current_col == column {
            return idx;
        }
        if c == '\n' {
            current_line += 1;
            current_col = 1;
        } else {
            current_col += 1;
        }
    }
    src.len()
}
