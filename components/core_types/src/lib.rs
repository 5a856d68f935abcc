//! Core value and error types shared by the promise engine.
//!
//! The promise engine treats JavaScript values as opaque: it stores them,
//! hands them to reaction handlers and passes them on as resolution values
//! or rejection reasons. This crate provides that opaque value model along
//! with the error and stack-capture types used for diagnostics.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of JavaScript values
//! - [`Completion`] - Result of running a handler (`Err` carries a thrown value)
//! - [`JsError`] - JavaScript errors with stack traces
//! - [`ErrorKind`] - Types of JavaScript errors
//! - [`StackFrame`] / [`SavedStack`] - Captured call stacks
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let reason: Value = JsError::type_error("not a promise").into();
//! assert!(matches!(reason, Value::Error(ref e) if e.kind == ErrorKind::TypeError));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod source;
mod value;

pub use error::{Completion, ErrorKind, JsError};
pub use source::{SavedStack, SourcePosition, StackFrame};
pub use value::Value;
