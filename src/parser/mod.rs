pub mod ast;
pub mod error;
pub mod lexer;
pub mod object_path;
#[allow(clippy::module_inception)]
pub mod parser;

// Re-exports for clean API
pub use ast::{ComparisonOp, CompoundOp, Literal, ObjectPath, PatternExpr, Qualifier};
pub use error::{PatternError, SyntaxError};
pub use lexer::{lex, Token, TokenKind};
pub use object_path::{parse_path, PathComponent, PathParseError};
pub use parser::parse;
