//! Error types for the RXT DSL front end

use crate::lexer::Span;
use rextporter_core::{ConfigError, StoreError};
use std::fmt;
use std::io;
use thiserror::Error;

/// A pattern source that does not compile.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid pattern at position {position}: {message}")]
pub struct PatternError {
    pub position: usize,
    pub message: String,
}

impl PatternError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Classification of parse failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    UnexpectedToken,
    UnknownKeyword,
    UnexpectedInput,
    BadIndent,
    /// A structural name missing from the token table. Internal, not a user error.
    TokenTable,
    MissingField,
    UndefinedReference,
    InvalidValue,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnknownKeyword => "unknown keyword",
            ParseErrorKind::UnexpectedInput => "unexpected input",
            ParseErrorKind::BadIndent => "bad indentation",
            ParseErrorKind::TokenTable => "token table mismatch",
            ParseErrorKind::MissingField => "missing field",
            ParseErrorKind::UndefinedReference => "undefined reference",
            ParseErrorKind::InvalidValue => "invalid value",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lexing or parsing failure with its source position.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Parse error at line {line}, column {column}: {kind}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }
}

/// Master error type for loading RXT sources.
#[derive(Debug, Error)]
pub enum DslError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Can not read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("Can not write {target}: {source}")]
    Write { target: String, source: io::Error },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DslResult<T> = Result<T, DslError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_has_position() {
        let span = Span {
            start: 10,
            end: 12,
            line: 3,
            column: 5,
        };
        let err = ParseError::new(ParseErrorKind::UnknownKeyword, "'FETCH'", span);
        assert_eq!(
            err.to_string(),
            "Parse error at line 3, column 5: unknown keyword: 'FETCH'"
        );
    }

    #[test]
    fn test_pattern_error_display() {
        let err = PatternError::new(4, "unclosed group '('");
        assert_eq!(
            err.to_string(),
            "Invalid pattern at position 4: unclosed group '('"
        );
    }

    #[test]
    fn test_dsl_error_wraps_sources() {
        let err: DslError = StoreError::NotFound {
            key: "mode".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("Store error:"));

        let err: DslError = ParseError::new(
            ParseErrorKind::BadIndent,
            "dedent does not match any outer level",
            Span::default(),
        )
        .into();
        assert!(matches!(
            err,
            DslError::Parse(ParseError {
                kind: ParseErrorKind::BadIndent,
                ..
            })
        ));
    }
}
