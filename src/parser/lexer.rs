//! Hand-written lexer for the STIX Patterning grammar.
//!
//! Malformed character sequences become [`TokenKind::Error`] tokens with a
//! message; the scan always continues to the end of input so the parser can
//! report several problems from a single compile call.

use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,

    Eq,
    Neq,
    Gt,
    Lt,
    Ge,
    Le,

    And,
    Or,
    Not,
    FollowedBy,
    Within,
    Repeats,
    Start,
    Stop,
    Times,
    Seconds,
    Minutes,
    Hours,
    Days,
    In,
    Like,
    Matches,
    IsSubset,
    IsSuperset,
    Exists,

    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(String),
    Hex(String),
    Binary(String),

    /// `observable-type:property.path` lexed as a single token, split at
    /// the first colon.
    Path {
        object_type: String,
        property_path: String,
    },

    /// Lexical error; the message is surfaced once by the parser.
    Error(String),

    Eof,
}

impl TokenKind {
    /// Short description used in "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Neq => "'!='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Ge => "'>='".to_string(),
            TokenKind::Le => "'<='".to_string(),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Not => "NOT".to_string(),
            TokenKind::FollowedBy => "FOLLOWEDBY".to_string(),
            TokenKind::Within => "WITHIN".to_string(),
            TokenKind::Repeats => "REPEATS".to_string(),
            TokenKind::Start => "START".to_string(),
            TokenKind::Stop => "STOP".to_string(),
            TokenKind::Times => "TIMES".to_string(),
            TokenKind::Seconds => "SECONDS".to_string(),
            TokenKind::Minutes => "MINUTES".to_string(),
            TokenKind::Hours => "HOURS".to_string(),
            TokenKind::Days => "DAYS".to_string(),
            TokenKind::In => "IN".to_string(),
            TokenKind::Like => "LIKE".to_string(),
            TokenKind::Matches => "MATCHES".to_string(),
            TokenKind::IsSubset => "ISSUBSET".to_string(),
            TokenKind::IsSuperset => "ISSUPERSET".to_string(),
            TokenKind::Exists => "EXISTS".to_string(),
            TokenKind::Str(s) => format!("string '{}'", s),
            TokenKind::Int(i) => format!("integer {}", i),
            TokenKind::Float(x) => format!("float {}", x),
            TokenKind::Bool(b) => format!("boolean {}", b),
            TokenKind::Timestamp(t) => format!("timestamp t'{}'", t),
            TokenKind::Hex(h) => format!("hex literal h'{}'", h),
            TokenKind::Binary(b) => format!("binary literal b'{}'", b),
            TokenKind::Path {
                object_type,
                property_path,
            } => format!("object path {}:{}", object_type, property_path),
            TokenKind::Error(msg) => format!("invalid input ({})", msg),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A token plus its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.kind.describe(), self.line, self.column)
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

/// Tokenize a pattern string. The returned stream always ends with an
/// [`TokenKind::Eof`] token carrying the position just past the input.
pub fn lex(input: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: input.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token() {
        tokens.push(token);
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        line: lexer.line,
        column: lexer.column,
    });
    tokens
}

impl<'a> Lexer<'a> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn token(&self, kind: TokenKind, line: usize, column: usize) -> Token {
        Token { kind, line, column }
    }

    fn next_token(&mut self) -> Option<Token> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
        let line = self.line;
        let column = self.column;
        let c = self.peek()?;

        let kind = match c {
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            ',' => self.single(TokenKind::Comma),
            '=' => self.single(TokenKind::Eq),
            '>' => self.one_or_two(TokenKind::Gt, '=', TokenKind::Ge),
            '<' => self.one_or_two(TokenKind::Lt, '=', TokenKind::Le),
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Neq
                } else {
                    TokenKind::Error("expected '=' after '!'".to_string())
                }
            }
            '\'' => self.string_literal(),
            '0'..='9' | '+' | '-' => self.number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.word(),
            other => {
                self.bump();
                TokenKind::Error(format!("unexpected character '{}'", other))
            }
        };
        Some(self.token(kind, line, column))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn one_or_two(&mut self, short: TokenKind, second: char, long: TokenKind) -> TokenKind {
        self.bump();
        if self.peek() == Some(second) {
            self.bump();
            long
        } else {
            short
        }
    }

    /// Single-quoted string with `\' \\ \n \r \t` escapes.
    fn string_literal(&mut self) -> TokenKind {
        self.bump(); // opening quote
        let mut out = String::new();
        let mut bad_escape = None;
        loop {
            match self.bump() {
                None => return TokenKind::Error("unterminated string literal".to_string()),
                Some('\'') => break,
                Some('\\') => match self.bump() {
                    None => {
                        return TokenKind::Error("unterminated escape sequence".to_string());
                    }
                    Some('\'') => out.push('\''),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some(other) => {
                        bad_escape.get_or_insert(other);
                    }
                },
                Some(c) => out.push(c),
            }
        }
        match bad_escape {
            Some(c) => TokenKind::Error(format!("invalid escape sequence '\\{}'", c)),
            None => TokenKind::Str(out),
        }
    }

    /// Raw quoted body for `t'...'`, `h'...'`, `b'...'` (no escapes).
    fn raw_quoted(&mut self) -> Result<String, TokenKind> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(TokenKind::Error(
                        "unterminated quoted literal".to_string(),
                    ))
                }
                Some('\'') => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> TokenKind {
        let mut text = String::new();
        if matches!(self.peek(), Some('+') | Some('-')) {
            text.push(self.bump().unwrap());
        }
        let mut saw_digit = false;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                saw_digit = true;
                text.push(self.bump().unwrap());
            } else if c == '.' && !is_float {
                is_float = true;
                text.push(self.bump().unwrap());
            } else {
                break;
            }
        }
        if !saw_digit {
            return TokenKind::Error(format!("expected digits after '{}'", text));
        }
        if is_float {
            match text.parse::<f64>() {
                Ok(x) => TokenKind::Float(x),
                Err(_) => TokenKind::Error(format!("invalid float literal '{}'", text)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => TokenKind::Int(i),
                Err(_) => TokenKind::Error(format!("invalid integer literal '{}'", text)),
            }
        }
    }

    /// Words cover keywords, booleans, typed quoted literals (`t' h' b'`),
    /// and object paths (`type-name:property.path`).
    fn word(&mut self) -> TokenKind {
        // t'...' / h'...' / b'...' before generic word scanning
        if let Some(prefix) = self.peek() {
            if matches!(prefix, 't' | 'h' | 'b') {
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek() == Some(&'\'') {
                    self.bump(); // prefix char
                    return match self.raw_quoted() {
                        Ok(body) => match prefix {
                            't' => TokenKind::Timestamp(body),
                            'h' => TokenKind::Hex(body),
                            _ => TokenKind::Binary(body),
                        },
                        Err(err) => err,
                    };
                }
            }
        }

        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                word.push(self.bump().unwrap());
            } else {
                break;
            }
        }

        if self.peek() == Some(':') {
            self.bump();
            return self.object_path(word);
        }

        match word.as_str() {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "NOT" => TokenKind::Not,
            "FOLLOWEDBY" => TokenKind::FollowedBy,
            "WITHIN" => TokenKind::Within,
            "REPEATS" => TokenKind::Repeats,
            "START" => TokenKind::Start,
            "STOP" => TokenKind::Stop,
            "TIMES" => TokenKind::Times,
            "SECOND" | "SECONDS" => TokenKind::Seconds,
            "MINUTE" | "MINUTES" => TokenKind::Minutes,
            "HOUR" | "HOURS" => TokenKind::Hours,
            "DAY" | "DAYS" => TokenKind::Days,
            "IN" => TokenKind::In,
            "LIKE" => TokenKind::Like,
            "MATCHES" => TokenKind::Matches,
            "ISSUBSET" => TokenKind::IsSubset,
            "ISSUPERSET" => TokenKind::IsSuperset,
            "EXISTS" => TokenKind::Exists,
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "" => TokenKind::Error("expected a token".to_string()),
            other => TokenKind::Error(format!("unexpected word '{}'", other)),
        }
    }

    /// Property path after the colon: dotted keys, `'quoted keys'`,
    /// `[index]`, `[*]`. Stops at whitespace or any operator character.
    fn object_path(&mut self, object_type: String) -> TokenKind {
        let mut path = String::new();
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '*') => {
                    path.push(self.bump().unwrap());
                }
                Some('[') => {
                    path.push(self.bump().unwrap());
                    loop {
                        match self.bump() {
                            None => {
                                return TokenKind::Error(
                                    "unterminated index in object path".to_string(),
                                )
                            }
                            Some(']') => {
                                path.push(']');
                                break;
                            }
                            Some(c) => path.push(c),
                        }
                    }
                }
                Some('\'') => {
                    path.push(self.bump().unwrap());
                    loop {
                        match self.bump() {
                            None => {
                                return TokenKind::Error(
                                    "unterminated quoted key in object path".to_string(),
                                )
                            }
                            Some('\\') => {
                                path.push('\\');
                                if let Some(c) = self.bump() {
                                    path.push(c);
                                }
                            }
                            Some('\'') => {
                                path.push('\'');
                                break;
                            }
                            Some(c) => path.push(c),
                        }
                    }
                }
                _ => break,
            }
        }
        if path.is_empty() {
            TokenKind::Error(format!(
                "expected property path after '{}:'",
                object_type
            ))
        } else {
            TokenKind::Path {
                object_type,
                property_path: path,
            }
        }
    }
}
