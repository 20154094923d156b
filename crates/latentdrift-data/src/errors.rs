//! Error types for schemas and records.

use thiserror::Error;

/// Errors raised while building schemas or assembling batches.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The attribute schema is malformed (duplicate names, empty domains).
    #[error("schema error: {0}")]
    Schema(String),

    /// A record does not conform to the schema it is paired with.
    #[error("record error: {0}")]
    Record(String),
}
