//! Error type shared by the parsing helpers.

use thiserror::Error;

/// Errors raised while building, converting or parsing formatted content.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Tokens or tags are not properly nested (mismatched end tag, unclosed
    /// element, more than one root, ...).
    #[error("structural error: {0}")]
    Structural(String),

    /// A parser rule failed; the error is located in the parsed text.
    #[error("error at line {line} near \"{snippet}\": {message}")]
    Rule {
        /// Description of the failure.
        message: String,
        /// Character offset in the parsed text.
        offset: usize,
        /// Line number, counting from 1.
        line: usize,
        /// Column, counting from 0.
        column: usize,
        /// Text matched by the failing rule.
        snippet: String,
    },

    /// Text is not a recognized date.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// A rule pattern failed to compile.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error from a rule handler that is not a parser error; passed through unchanged.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ParseError {
    /// Shorthand for a [`ParseError::Structural`] error.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }
}
