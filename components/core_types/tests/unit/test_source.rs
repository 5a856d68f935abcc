//! Unit tests for stack capture types

use core_types::{SavedStack, SourcePosition, StackFrame};

#[test]
fn test_empty_saved_stack() {
    let stack = SavedStack::default();
    assert!(stack.is_empty());
    assert_eq!(stack.to_string(), "");
}

#[test]
fn test_saved_stack_keeps_frame_order() {
    let stack = SavedStack::new(vec![
        StackFrame::new("a", "x.js", 1, 1),
        StackFrame::new("b", "x.js", 2, 1),
    ]);
    let names: Vec<_> = stack
        .frames()
        .iter()
        .map(|f| f.function_name.clone().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_source_position_equality() {
    let a = SourcePosition { line: 3, column: 4, offset: 20 };
    assert_eq!(a.clone(), a);
}
