//! Error types of the page buffer.

use pageview_core_parse::ParseError;
use thiserror::Error;

/// Errors returned by [`TextBuffer`](crate::TextBuffer) operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The structural tree violates the document model (unknown element,
    /// element in a place where it is not allowed, ...).
    #[error("structural error: {0}")]
    Structural(String),

    /// Converting between tokens, trees and xml failed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Character offset or line outside the buffer.
    #[error("invalid position: {0}")]
    InvalidPosition(usize),

    /// Range with `start > end` or outside the buffer.
    #[error("invalid range: {start}..{end}")]
    InvalidRange {
        /// Range start.
        start: usize,
        /// Range end.
        end: usize,
    },

    /// Interactive edit on a buffer that is not editable.
    #[error("buffer is read-only")]
    ReadOnly,

    /// Format name that is not known to the tag table.
    #[error("invalid tag name: {0}")]
    InvalidTagName(String),
}

impl BufferError {
    /// Shorthand for a [`BufferError::Structural`] error.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }
}

/// Error compiling a find query.
#[derive(Debug, Error)]
pub enum FindError {
    /// The query is not a valid regular expression.
    #[error("invalid find pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Result alias for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;
