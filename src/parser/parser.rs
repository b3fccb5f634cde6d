//! Recursive-descent parser for the STIX Patterning grammar.
//!
//! The parser never fails hard: unexpected tokens are recorded as
//! [`SyntaxError`]s and the parser synchronizes at the next `]`, `)`,
//! `AND`, `OR`, `FOLLOWEDBY`, or end of input, so a single pass can
//! report several problems. Precedence, loosest to tightest:
//! `FOLLOWEDBY`, `OR`, `AND` between observation expressions, then
//! `OR`/`AND` again between comparisons inside brackets.

use super::ast::{ComparisonOp, CompoundOp, Literal, ObjectPath, PatternExpr, Qualifier};
use super::error::SyntaxError;
use super::lexer::{Token, TokenKind};

pub struct PatternParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    errors: Vec<SyntaxError>,
}

/// Parse a token stream into an AST plus accumulated syntax errors. The
/// AST is only meaningful when the error list is empty.
pub fn parse(tokens: &[Token]) -> (Option<PatternExpr>, Vec<SyntaxError>) {
    let mut parser = PatternParser {
        tokens,
        pos: 0,
        errors: Vec::new(),
    };
    let expr = parser.parse_pattern();
    (expr, parser.errors)
}

impl<'a> PatternParser<'a> {
    fn peek(&self) -> &Token {
        // lex() guarantees a trailing Eof token
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.peek().kind != TokenKind::Eof {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn error_at(&mut self, token: &Token, message: impl Into<String>) {
        self.errors
            .push(SyntaxError::new(token.line, token.column, message));
    }

    /// Record an error for the current token. Lexical error tokens carry
    /// their own message and are surfaced verbatim.
    fn report_unexpected(&mut self, expected: &str) {
        let token = self.peek().clone();
        let message = match &token.kind {
            TokenKind::Error(msg) => msg.clone(),
            kind => format!("expected {}, found {}", expected, kind.describe()),
        };
        self.error_at(&token, message);
    }

    /// Skip forward to the next point parsing can reasonably resume from.
    fn synchronize(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::RBracket
                | TokenKind::RParen
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::FollowedBy
                | TokenKind::Eof => break,
                _ => self.advance(),
            }
        }
    }

    fn expect_close(&mut self, kind: TokenKind, expected: &str) {
        if self.peek().kind == kind {
            self.advance();
        } else {
            self.report_unexpected(expected);
            self.synchronize();
            if self.peek().kind == kind {
                self.advance();
            }
        }
    }

    fn combine(
        op: CompoundOp,
        left: Option<PatternExpr>,
        right: Option<PatternExpr>,
    ) -> Option<PatternExpr> {
        match (left, right) {
            (Some(l), Some(r)) => Some(PatternExpr::compound(op, l, r)),
            _ => None,
        }
    }

    fn parse_pattern(&mut self) -> Option<PatternExpr> {
        let expr = self.parse_followed_by();
        if !self.at_end() {
            self.report_unexpected("end of input");
            while !self.at_end() {
                self.advance();
            }
        }
        expr
    }

    fn parse_followed_by(&mut self) -> Option<PatternExpr> {
        let mut left = self.parse_observation_or();
        while self.peek().kind == TokenKind::FollowedBy {
            self.advance();
            let right = self.parse_observation_or();
            left = Self::combine(CompoundOp::FollowedBy, left, right);
        }
        left
    }

    fn parse_observation_or(&mut self) -> Option<PatternExpr> {
        let mut left = self.parse_observation_and();
        while self.peek().kind == TokenKind::Or {
            self.advance();
            let right = self.parse_observation_and();
            left = Self::combine(CompoundOp::Or, left, right);
        }
        left
    }

    fn parse_observation_and(&mut self) -> Option<PatternExpr> {
        let mut left = self.parse_observation_unit();
        while self.peek().kind == TokenKind::And {
            self.advance();
            let right = self.parse_observation_unit();
            left = Self::combine(CompoundOp::And, left, right);
        }
        left
    }

    fn parse_observation_unit(&mut self) -> Option<PatternExpr> {
        match self.peek().kind {
            TokenKind::LBracket => {
                self.advance();
                let inner = self.parse_comparison_or();
                self.expect_close(
                    TokenKind::RBracket,
                    "']' to close the observation expression",
                );
                let observation = inner.map(PatternExpr::observation);
                self.parse_qualifiers(observation)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_followed_by();
                self.expect_close(TokenKind::RParen, "')' to close the group");
                self.parse_qualifiers(inner)
            }
            _ => {
                self.report_unexpected("'[' to begin an observation expression");
                self.synchronize();
                None
            }
        }
    }

    /// Trailing `WITHIN` / `REPEATS` / `START ... STOP` qualifiers.
    fn parse_qualifiers(&mut self, mut expr: Option<PatternExpr>) -> Option<PatternExpr> {
        loop {
            match self.peek().kind {
                TokenKind::Within => {
                    self.advance();
                    match (self.expect_int("a time amount"), self.expect_time_unit()) {
                        (Some(n), Some(unit)) => {
                            expr = expr.map(|e| {
                                PatternExpr::qualified(
                                    e,
                                    Qualifier::Within,
                                    format!("{} {}", n, unit),
                                )
                            });
                        }
                        _ => expr = None,
                    }
                }
                TokenKind::Repeats => {
                    self.advance();
                    let n = self.expect_int("a repeat count");
                    if self.peek().kind == TokenKind::Times {
                        self.advance();
                    } else {
                        self.report_unexpected("TIMES after the repeat count");
                        self.synchronize();
                    }
                    match n {
                        Some(n) => {
                            expr = expr.map(|e| {
                                PatternExpr::qualified(e, Qualifier::Repeats, n.to_string())
                            });
                        }
                        None => expr = None,
                    }
                }
                TokenKind::Start => {
                    self.advance();
                    match self.expect_timestamp("a t'...' timestamp after START") {
                        Some(ts) => {
                            expr = expr
                                .map(|e| PatternExpr::qualified(e, Qualifier::Start, ts));
                        }
                        None => expr = None,
                    }
                    if self.peek().kind == TokenKind::Stop {
                        // loop handles STOP as its own qualifier layer
                        continue;
                    }
                    self.report_unexpected("STOP after the START qualifier");
                    expr = None;
                }
                TokenKind::Stop => {
                    self.advance();
                    match self.expect_timestamp("a t'...' timestamp after STOP") {
                        Some(ts) => {
                            expr =
                                expr.map(|e| PatternExpr::qualified(e, Qualifier::Stop, ts));
                        }
                        None => expr = None,
                    }
                }
                _ => break,
            }
        }
        expr
    }

    fn expect_int(&mut self, expected: &str) -> Option<i64> {
        if let TokenKind::Int(n) = self.peek().kind {
            self.advance();
            Some(n)
        } else {
            self.report_unexpected(expected);
            self.synchronize();
            None
        }
    }

    fn expect_time_unit(&mut self) -> Option<&'static str> {
        let unit = match self.peek().kind {
            TokenKind::Seconds => "SECONDS",
            TokenKind::Minutes => "MINUTES",
            TokenKind::Hours => "HOURS",
            TokenKind::Days => "DAYS",
            _ => {
                self.report_unexpected("a time unit (SECONDS, MINUTES, HOURS, DAYS)");
                self.synchronize();
                return None;
            }
        };
        self.advance();
        Some(unit)
    }

    fn expect_timestamp(&mut self, expected: &str) -> Option<String> {
        if let TokenKind::Timestamp(ts) = &self.peek().kind {
            let ts = ts.clone();
            self.advance();
            Some(ts)
        } else {
            self.report_unexpected(expected);
            self.synchronize();
            None
        }
    }

    fn parse_comparison_or(&mut self) -> Option<PatternExpr> {
        let mut left = self.parse_comparison_and();
        while self.peek().kind == TokenKind::Or {
            self.advance();
            let right = self.parse_comparison_and();
            left = Self::combine(CompoundOp::Or, left, right);
        }
        left
    }

    fn parse_comparison_and(&mut self) -> Option<PatternExpr> {
        let mut left = self.parse_comparison_term();
        while self.peek().kind == TokenKind::And {
            self.advance();
            let right = self.parse_comparison_term();
            left = Self::combine(CompoundOp::And, left, right);
        }
        left
    }

    fn parse_comparison_term(&mut self) -> Option<PatternExpr> {
        match self.peek().kind.clone() {
            TokenKind::Not => {
                let not_token = self.peek().clone();
                self.advance();
                match self.parse_comparison_term() {
                    Some(PatternExpr::Comparison {
                        path,
                        negated,
                        op,
                        value,
                    }) => Some(PatternExpr::Comparison {
                        path,
                        negated: !negated,
                        op,
                        value,
                    }),
                    Some(_) => {
                        self.error_at(&not_token, "NOT may only prefix a single comparison");
                        None
                    }
                    None => None,
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_comparison_or();
                self.expect_close(TokenKind::RParen, "')' to close the group");
                inner
            }
            TokenKind::Path {
                object_type,
                property_path,
            } => {
                self.advance();
                self.parse_property_test(ObjectPath {
                    object_type,
                    property_path,
                })
            }
            _ => {
                self.report_unexpected("a comparison expression");
                self.synchronize();
                None
            }
        }
    }

    fn parse_property_test(&mut self, path: ObjectPath) -> Option<PatternExpr> {
        let mut negated = false;
        if self.peek().kind == TokenKind::Not {
            self.advance();
            negated = true;
        }

        let op = match self.peek().kind {
            TokenKind::Eq => ComparisonOp::Eq,
            TokenKind::Neq => ComparisonOp::Neq,
            TokenKind::Gt => ComparisonOp::Gt,
            TokenKind::Lt => ComparisonOp::Lt,
            TokenKind::Ge => ComparisonOp::Ge,
            TokenKind::Le => ComparisonOp::Le,
            TokenKind::In => ComparisonOp::In,
            TokenKind::Like => ComparisonOp::Like,
            TokenKind::Matches => ComparisonOp::Matches,
            TokenKind::IsSubset => ComparisonOp::IsSubset,
            TokenKind::IsSuperset => ComparisonOp::IsSuperset,
            TokenKind::Exists => {
                self.advance();
                return Some(PatternExpr::Comparison {
                    path,
                    negated,
                    op: ComparisonOp::Exists,
                    value: None,
                });
            }
            _ => {
                self.report_unexpected("a comparison operator");
                self.synchronize();
                return None;
            }
        };
        self.advance();

        let value = self.parse_value()?;
        Some(PatternExpr::Comparison {
            path,
            negated,
            op,
            value: Some(Box::new(value)),
        })
    }

    fn parse_value(&mut self) -> Option<PatternExpr> {
        if self.peek().kind == TokenKind::LParen {
            self.advance();
            let mut items = Vec::new();
            if self.peek().kind != TokenKind::RParen {
                loop {
                    match self.parse_literal("a literal value in the set") {
                        Some(lit) => items.push(lit),
                        None => break,
                    }
                    if self.peek().kind == TokenKind::Comma {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.expect_close(TokenKind::RParen, "')' to close the set literal");
            // empty sets are rejected by the validator, not here
            return Some(PatternExpr::List(items));
        }
        self.parse_literal("a literal value")
    }

    fn parse_literal(&mut self, expected: &str) -> Option<PatternExpr> {
        let literal = match self.peek().kind.clone() {
            TokenKind::Str(s) => Literal::Str(s),
            TokenKind::Int(i) => Literal::Int(i),
            TokenKind::Float(x) => Literal::Float(x),
            TokenKind::Bool(b) => Literal::Bool(b),
            TokenKind::Timestamp(t) => Literal::Timestamp(t),
            TokenKind::Hex(h) => Literal::Hex(h),
            TokenKind::Binary(b) => Literal::Binary(b),
            _ => {
                self.report_unexpected(expected);
                self.synchronize();
                return None;
            }
        };
        self.advance();
        Some(PatternExpr::Literal(literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::lex;

    fn parse_ok(input: &str) -> PatternExpr {
        let tokens = lex(input);
        let (expr, errors) = parse(&tokens);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        expr.expect("expression")
    }

    fn parse_errors(input: &str) -> Vec<SyntaxError> {
        let tokens = lex(input);
        let (_, errors) = parse(&tokens);
        errors
    }

    #[test]
    fn single_observation() {
        let expr = parse_ok("[file:name = 'a.exe']");
        match expr {
            PatternExpr::Observation(inner) => match *inner {
                PatternExpr::Comparison {
                    ref path,
                    negated,
                    op,
                    ref value,
                } => {
                    assert_eq!(path.object_type, "file");
                    assert_eq!(path.property_path, "name");
                    assert!(!negated);
                    assert_eq!(op, ComparisonOp::Eq);
                    assert_eq!(
                        value.as_deref(),
                        Some(&PatternExpr::Literal(Literal::Str("a.exe".to_string())))
                    );
                }
                ref other => panic!("expected comparison, got {:?}", other),
            },
            other => panic!("expected observation, got {:?}", other),
        }
    }

    #[test]
    fn and_binds_tighter_than_or_inside_brackets() {
        let expr = parse_ok("[file:name = 'a' OR file:name = 'b' AND file:size > 1]");
        let PatternExpr::Observation(inner) = expr else {
            panic!("expected observation");
        };
        match *inner {
            PatternExpr::Compound {
                op: CompoundOp::Or,
                ref right,
                ..
            } => {
                assert!(matches!(
                    **right,
                    PatternExpr::Compound {
                        op: CompoundOp::And,
                        ..
                    }
                ));
            }
            ref other => panic!("expected OR at the top, got {:?}", other),
        }
    }

    #[test]
    fn followedby_is_loosest() {
        let expr = parse_ok("[file:name = 'a'] AND [file:name = 'b'] FOLLOWEDBY [file:name = 'c']");
        assert!(matches!(
            expr,
            PatternExpr::Compound {
                op: CompoundOp::FollowedBy,
                ..
            }
        ));
    }

    #[test]
    fn not_prefix_flips_negation() {
        let expr = parse_ok("[NOT file:name = 'a.exe']");
        let PatternExpr::Observation(inner) = expr else {
            panic!("expected observation");
        };
        assert!(matches!(
            *inner,
            PatternExpr::Comparison { negated: true, .. }
        ));

        // double negation cancels
        let expr = parse_ok("[NOT file:name NOT = 'a.exe']");
        let PatternExpr::Observation(inner) = expr else {
            panic!("expected observation");
        };
        assert!(matches!(
            *inner,
            PatternExpr::Comparison { negated: false, .. }
        ));
    }

    #[test]
    fn set_literal_and_in() {
        let expr = parse_ok("[file:name IN ('a.exe', 'b.exe')]");
        let PatternExpr::Observation(inner) = expr else {
            panic!("expected observation");
        };
        let PatternExpr::Comparison { op, value, .. } = *inner else {
            panic!("expected comparison");
        };
        assert_eq!(op, ComparisonOp::In);
        let PatternExpr::List(items) = *value.unwrap() else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn exists_has_no_value() {
        let expr = parse_ok("[file:hashes EXISTS]");
        let PatternExpr::Observation(inner) = expr else {
            panic!("expected observation");
        };
        assert!(matches!(
            *inner,
            PatternExpr::Comparison {
                op: ComparisonOp::Exists,
                value: None,
                ..
            }
        ));
    }

    #[test]
    fn within_qualifier_wraps_observation() {
        let expr = parse_ok("[file:name = 'a'] WITHIN 5 SECONDS");
        match expr {
            PatternExpr::Qualified {
                qualifier, value, ..
            } => {
                assert_eq!(qualifier, Qualifier::Within);
                assert_eq!(value, "5 SECONDS");
            }
            other => panic!("expected qualified, got {:?}", other),
        }
    }

    #[test]
    fn start_stop_nest_two_layers() {
        let expr =
            parse_ok("[file:name = 'a'] START t'2020-01-01T00:00:00Z' STOP t'2020-01-02T00:00:00Z'");
        let PatternExpr::Qualified {
            qualifier: Qualifier::Stop,
            observation,
            value,
        } = expr
        else {
            panic!("expected STOP layer on the outside");
        };
        assert_eq!(value, "2020-01-02T00:00:00Z");
        assert!(matches!(
            *observation,
            PatternExpr::Qualified {
                qualifier: Qualifier::Start,
                ..
            }
        ));
    }

    #[test]
    fn parenthesized_observations_take_qualifiers() {
        let expr = parse_ok("([file:name = 'a'] FOLLOWEDBY [file:name = 'b']) WITHIN 10 MINUTES");
        let PatternExpr::Qualified {
            qualifier: Qualifier::Within,
            observation,
            value,
        } = expr
        else {
            panic!("expected qualified group");
        };
        assert_eq!(value, "10 MINUTES");
        assert!(matches!(
            *observation,
            PatternExpr::Compound {
                op: CompoundOp::FollowedBy,
                ..
            }
        ));
    }

    #[test]
    fn missing_close_bracket_reports_position_after_input() {
        let errors = parse_errors("[file:name = 'a.exe'");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
        assert!(errors[0].column >= 20, "got {:?}", errors[0]);
        assert!(errors[0].message.contains("']'"), "got {:?}", errors[0]);
    }

    #[test]
    fn recovery_reports_multiple_errors() {
        let errors = parse_errors("[file:name = ] AND [file:size > ]");
        assert_eq!(errors.len(), 2, "got {:?}", errors);
        assert!(errors[0].column < errors[1].column);
    }

    #[test]
    fn missing_value_reports_error() {
        let errors = parse_errors("[file:name = ]");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("literal"), "got {:?}", errors[0]);
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        let errors = parse_errors("[file:name = 'a'] ]");
        assert_eq!(errors.len(), 1);
        assert!(
            errors[0].message.contains("end of input"),
            "got {:?}",
            errors[0]
        );
    }

    #[test]
    fn lexical_error_message_is_surfaced() {
        let errors = parse_errors("[file:name = 'a.exe]");
        assert!(!errors.is_empty());
        assert!(
            errors.iter().any(|e| e.message.contains("unterminated")),
            "got {:?}",
            errors
        );
    }
}
