//! Error types for the KadeQL pipeline
//!
//! Lexing and parsing fail with [`ParseError`] carrying line/column.
//! Everything downstream (predicate lowering, execution) flows through the
//! storage error type, and [`KadeQlError`] unifies both for callers that
//! want a single surface.

use kadedb_core::KadeError;
use thiserror::Error;

/// Result type alias for KadeQL operations
pub type KadeQlResult<T> = Result<T, KadeQlError>;

/// Unified error type for the KadeQL pipeline
#[derive(Error, Debug, Clone)]
pub enum KadeQlError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] KadeError),
}

/// Syntax error with source position
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl ParseError {
    /// Create a parse error at the given position
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("unterminated string literal", 2, 14);
        assert_eq!(
            err.to_string(),
            "parse error at line 2, column 14: unterminated string literal"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: KadeQlError = ParseError::new("x", 1, 1).into();
        assert!(matches!(err, KadeQlError::Parse(_)));
        let err: KadeQlError = KadeError::not_found("table 't'").into();
        assert!(matches!(err, KadeQlError::Storage(_)));
    }
}
