//! Common result and error types for the Strata engine.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an unrecoverable internal error (a bug in Strata), not a
/// user-facing error. User errors such as parse or compile failures are
/// reported through the diagnostic sink and the operation still returns `Ok`.
pub type StrataResult<T> = Result<T, InternalError>;

/// An internal error indicating a broken engine invariant, not a user input problem.
///
/// Raised when, for example, a stale layer handle is used after the layer was
/// disposed. If one occurs there is a logic error in the engine.
#[derive(Debug, thiserror::Error)]
#[error("internal engine error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
