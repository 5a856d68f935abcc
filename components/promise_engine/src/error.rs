//! Error types for the promise engine.

use core_types::{JsError, Value};
use thiserror::Error;

/// Failures surfaced by promise operations.
///
/// Settling an already-settled promise is not an error (see
/// [`SettleOutcome::AlreadyResolved`](crate::SettleOutcome)), and neither is
/// introspecting a non-promise, which degrades to a safe default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromiseError {
    /// The operand of a promise operation was not a promise object
    #[error("TypeError: expected a Promise, got {0}")]
    NotAPromise(&'static str),

    /// The owning context is shutting down and refused the dispatch
    #[error("dispatch rejected: event loop is shutting down")]
    DispatchRejected,

    /// Context options could not be parsed
    #[error("invalid context options: {0}")]
    InvalidOptions(String),
}

impl PromiseError {
    /// Type error for a non-promise operand.
    pub(crate) fn not_a_promise(value: &Value) -> Self {
        PromiseError::NotAPromise(value.type_of())
    }
}

impl From<PromiseError> for JsError {
    fn from(err: PromiseError) -> Self {
        JsError::type_error(err.to_string())
    }
}

impl From<serde_json::Error> for PromiseError {
    fn from(err: serde_json::Error) -> Self {
        PromiseError::InvalidOptions(err.to_string())
    }
}

/// Result type for promise operations
pub type PromiseResult<T> = Result<T, PromiseError>;
