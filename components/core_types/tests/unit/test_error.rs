//! Unit tests for JsError

use core_types::{ErrorKind, JsError, StackFrame};

#[test]
fn test_new_error_has_empty_stack() {
    let error = JsError::new(ErrorKind::InternalError, "oops");
    assert!(error.stack.is_empty());
    assert!(error.source_position.is_none());
}

#[test]
fn test_with_stack_attaches_frames() {
    let error = JsError::type_error("bad").with_stack(vec![StackFrame::new("f", "a.js", 1, 2)]);
    assert_eq!(error.stack.len(), 1);
    assert_eq!(error.stack[0].line, 1);
}

#[test]
fn test_error_implements_std_error() {
    fn takes_error(_: &dyn std::error::Error) {}
    takes_error(&JsError::type_error("x"));
}
