// Query Error Surface
// Every failure a query can produce, as a closed set of kinds. Structural
// errors (type, arity, bounds) abort evaluation and carry the byte offset of
// the step that raised them; absence is represented by AbsorbingNone in the
// value model, never by an error.

use thiserror::Error;

/// Errors raised while parsing or evaluating a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query text failed to parse.
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// An operator received a context of the wrong kind.
    #[error("type error at byte {offset}: '{operator}' expected {expected}, got {got}")]
    Type {
        operator: &'static str,
        expected: &'static str,
        got: String,
        offset: usize,
    },

    /// An operator was invoked with the wrong number of arguments.
    #[error("arity error at byte {offset}: '{operator}' expects {expected}, got {got}")]
    Arity {
        operator: String,
        expected: String,
        got: usize,
        offset: usize,
    },

    /// `[n]` indexing outside the collection bounds.
    #[error("index {index} out of range at byte {offset} (length {len})")]
    IndexOutOfRange {
        index: i64,
        len: usize,
        offset: usize,
    },

    /// `single()` saw two incompatible values.
    #[error("single() disagreement at byte {offset}: {left} vs {right}")]
    SingleDisagreement {
        left: String,
        right: String,
        offset: usize,
    },

    /// A link field could not be resolved.
    #[error("link resolution failed for query '{query}': {reason}")]
    LinkResolution { query: String, reason: String },

    /// A regex pattern argument failed to compile.
    #[error("invalid pattern at byte {offset}: '{pattern}': {message}")]
    Pattern {
        pattern: String,
        message: String,
        offset: usize,
    },
}

impl QueryError {
    /// Byte offset into the query text, where the error kind carries one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            QueryError::Parse { offset, .. }
            | QueryError::Type { offset, .. }
            | QueryError::Arity { offset, .. }
            | QueryError::IndexOutOfRange { offset, .. }
            | QueryError::SingleDisagreement { offset, .. }
            | QueryError::Pattern { offset, .. } => Some(*offset),
            QueryError::LinkResolution { .. } => None,
        }
    }
}
