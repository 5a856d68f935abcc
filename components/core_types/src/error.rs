//! JavaScript error types and error handling.
//!
//! This module provides error types that correspond to JavaScript's built-in
//! error types, along with stack trace information.

use crate::{SourcePosition, StackFrame, Value};
use thiserror::Error;

/// Outcome of running a handler, executor or job callback.
///
/// `Ok` is the normal return value, `Err` is the value that was thrown.
pub type Completion = Result<Value, Value>;

/// The kind of JavaScript error.
///
/// These correspond to JavaScript's built-in error constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Type error (e.g., calling a non-function)
    TypeError,
    /// Reference to an undefined variable
    ReferenceError,
    /// Value out of allowed range
    RangeError,
    /// Internal engine error
    InternalError,
}

/// A JavaScript error with message and stack trace.
///
/// # Examples
///
/// ```
/// use core_types::{JsError, ErrorKind};
///
/// let error = JsError::type_error("undefined is not a function");
///
/// assert_eq!(error.kind, ErrorKind::TypeError);
/// assert_eq!(error.to_string(), "TypeError: undefined is not a function");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Stack trace (call stack at the time of the error)
    pub stack: Vec<StackFrame>,
    /// Source position where the error occurred
    pub source_position: Option<SourcePosition>,
}

impl JsError {
    /// Creates an error of the given kind with an empty stack.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: Vec::new(),
            source_position: None,
        }
    }

    /// Shorthand for a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Attaches a captured stack to the error.
    pub fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.stack = stack;
        self
    }
}

impl From<JsError> for Value {
    fn from(error: JsError) -> Self {
        Value::Error(Box::new(error))
    }
}
