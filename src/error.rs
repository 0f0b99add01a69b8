// ABOUTME: Runtime error type and the diagnostics sink shared by every pipeline stage
use std::fmt;

use thiserror::Error;

use crate::token::{Token, TokenKind};

/// A failure raised while evaluating a resolved program: undefined
/// variables, type mismatches, arity mismatches, and the like. Carries the
/// token the error occurred at so a diagnostic can report a line number.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        Self { token, message: message.into() }
    }
}

/// One reported problem, already formatted the way the CLI driver prints it.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    /// Raised by the scanner, parser, or resolver — a static error.
    Static { line: usize, location: String, message: String },
    /// Raised by the interpreter while running an already-resolved program.
    Runtime { line: usize, message: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Static { line, location, message } => {
                write!(f, "[line {line}] Error{location}: {message}")
            }
            Diagnostic::Runtime { line, message } => {
                write!(f, "{message}\n[line {line}]")
            }
        }
    }
}

/// Accumulates diagnostics across the scan/parse/resolve/interpret pipeline.
///
/// Replaces the "set a global had-error flag" approach with an explicit
/// sink threaded through each stage, so a host embedding the interpreter
/// (or a test) can inspect what went wrong without reading process state.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan_error(&mut self, line: usize, message: impl Into<String>) {
        self.items.push(Diagnostic::Static { line, location: String::new(), message: message.into() });
    }

    pub fn parse_error(&mut self, token: &Token, message: impl Into<String>) {
        self.static_error_at(token, message);
    }

    pub fn resolve_error(&mut self, token: &Token, message: impl Into<String>) {
        self.static_error_at(token, message);
    }

    fn static_error_at(&mut self, token: &Token, message: impl Into<String>) {
        let location = if token.kind == TokenKind::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        self.items.push(Diagnostic::Static { line: token.line, location, message: message.into() });
    }

    pub fn runtime_error(&mut self, error: &RuntimeError) {
        self.had_runtime_error = true;
        self.items.push(Diagnostic::Runtime { line: error.token.line, message: error.message.clone() });
    }

    /// True once any scan/parse/resolve error has been recorded. A script
    /// run stops before interpretation begins once this is set.
    pub fn had_error(&self) -> bool {
        self.items.iter().any(|d| matches!(d, Diagnostic::Static { .. }))
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Literal;

    fn tok(kind: TokenKind, lexeme: &str, line: usize) -> Token {
        Token::new(kind, lexeme, None, line)
    }

    #[test]
    fn scan_error_has_no_location() {
        let mut d = Diagnostics::new();
        d.scan_error(3, "Unexpected character.");
        let rendered = d.iter().next().unwrap().to_string();
        assert_eq!(rendered, "[line 3] Error: Unexpected character.");
    }

    #[test]
    fn parse_error_at_eof() {
        let mut d = Diagnostics::new();
        d.parse_error(&tok(TokenKind::Eof, "", 5), "Expect expression.");
        let rendered = d.iter().next().unwrap().to_string();
        assert_eq!(rendered, "[line 5] Error at end: Expect expression.");
    }

    #[test]
    fn parse_error_at_token() {
        let mut d = Diagnostics::new();
        d.parse_error(&tok(TokenKind::Identifier, "foo", 2), "Expect ';' after value.");
        let rendered = d.iter().next().unwrap().to_string();
        assert_eq!(rendered, "[line 2] Error at 'foo': Expect ';' after value.");
    }

    #[test]
    fn runtime_error_sets_flag() {
        let mut d = Diagnostics::new();
        let err = RuntimeError::new(tok(TokenKind::Identifier, "x", 7), "Undefined variable 'x'.");
        d.runtime_error(&err);
        assert!(d.had_runtime_error());
        assert!(!d.had_error());
        let rendered = d.iter().next().unwrap().to_string();
        assert_eq!(rendered, "Undefined variable 'x'.\n[line 7]");
    }

    #[test]
    fn literal_field_unused_by_display_but_preserved() {
        let t = tok(TokenKind::Number, "1", 1);
        assert!(matches!(t.literal, None));
        let with_lit = Token::new(TokenKind::Number, "1", Some(Literal::Number(1.0)), 1);
        assert_eq!(with_lit.literal, Some(Literal::Number(1.0)));
    }
}
