//! Compile, validate, and evaluate STIX patterns against cyber observable
//! records.
//!
//! A pattern string is compiled into an immutable AST with accumulated,
//! positioned syntax errors (never a panic or an `Err`), optionally checked
//! for semantic well-formedness, and evaluated against the JSON projection
//! of one or more candidate records:
//!
//! ```
//! use serde_json::json;
//!
//! let record = json!({"type": "file", "name": "malware.exe", "size": 4096});
//!
//! assert!(stix_pattern::evaluate("[file:name LIKE 'mal%']", &record));
//! assert!(!stix_pattern::evaluate("[file:size < 100]", &record));
//!
//! let compiled = stix_pattern::compile("[file:name = 'a.exe'");
//! assert!(!compiled.is_valid());
//! assert_eq!(compiled.errors().len(), 1);
//! ```

pub mod eval;
pub mod parser;
pub mod pattern;
pub mod validator;

pub use eval::{evaluate, evaluate_compiled, matching_records, EvaluationContext};
pub use parser::{
    ComparisonOp, CompoundOp, Literal, ObjectPath, PatternError, PatternExpr, Qualifier,
    SyntaxError,
};
pub use pattern::{compile, CompiledPattern};
pub use validator::{validate_ast, ValidationResult, OBSERVABLE_TYPES};

/// True iff the pattern compiles with no syntax errors.
pub fn is_valid(pattern: &str) -> bool {
    compile(pattern).is_valid()
}

/// Human-readable syntax and semantic errors for a pattern; empty when the
/// pattern is fully valid.
pub fn validate(pattern: &str) -> Vec<String> {
    let compiled = compile(pattern);
    match compiled.ast() {
        Some(ast) => validator::validate_ast(ast).errors,
        None => compiled.errors().iter().map(|e| e.to_string()).collect(),
    }
}

/// Debug rendering of the pattern's AST, or a failure message when it does
/// not compile.
pub fn render_ast(pattern: &str) -> String {
    compile(pattern).render_ast()
}
