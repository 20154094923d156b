//! Error types for graph construction, inference and the learning session.

use thiserror::Error;

use latentdrift_data::DataError;

/// Errors that can occur while configuring or running a learning session.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// Non-fatal conditions are not errors: a variance clamp is reported through
/// [`VmpDiagnostics`](crate::engine::vmp::VmpDiagnostics) and an exhausted
/// iteration budget through the `converged` flag of a refinement.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LearnError {
    /// Invalid structural parameter (class index, hidden count, fading, budget).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Query for a variable name the model does not contain.
    #[error("not found: {0}")]
    NotFound(String),

    /// Query issued before the session was initialized.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// Batch does not conform to the session schema.
    #[error("data error: {0}")]
    Data(#[from] DataError),

    /// Internal invariant violation (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}

impl LearnError {
    /// True for errors that leave the session uninitialized.
    pub fn is_configuration(&self) -> bool {
        matches!(self, LearnError::Configuration(_))
    }
}
