//! Error types for parsing Python source.
//!
//! Parsing is the only fallible operation in this crate: lowering never fails
//! (unsupported constructs are kept verbatim) and unparsing is total.

use thiserror::Error;

/// Errors from parsing Python source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SyntaxError {
    /// Failed to initialise the Tree-sitter parser.
    #[error("failed to initialise the python parser: {message}")]
    ParserInitError {
        /// Description of the failure.
        message: String,
    },

    /// The source text is not valid Python.
    #[error("invalid syntax at line {line}, column {column}: {message}")]
    InvalidSyntax {
        /// Line number (one-based) of the first error.
        line: u32,
        /// Column number (one-based) of the first error.
        column: u32,
        /// Description of the problem, including a snippet of the source.
        message: String,
    },

    /// The source text parsed, but is not a single expression.
    #[error("expected a single expression: {message}")]
    NotAnExpression {
        /// Description of what was found instead.
        message: String,
    },

    /// Tree-sitter did not produce a tree at all.
    #[error("internal error: {message}")]
    InternalError {
        /// Description of the internal error.
        message: String,
    },
}

impl SyntaxError {
    /// Creates a parser initialisation error.
    #[must_use]
    pub fn parser_init(message: impl Into<String>) -> Self {
        Self::ParserInitError {
            message: message.into(),
        }
    }

    /// Creates an invalid syntax error at a one-based position.
    #[must_use]
    pub fn invalid_syntax(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            line,
            column,
            message: message.into(),
        }
    }

    /// Creates a not-an-expression error.
    #[must_use]
    pub fn not_an_expression(message: impl Into<String>) -> Self {
        Self::NotAnExpression {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
