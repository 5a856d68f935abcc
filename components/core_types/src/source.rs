//! Source positions and captured call stacks.
//!
//! Promises optionally record where they were allocated and where they were
//! resolved. Those captures are informational only; nothing in the engine
//! branches on them.

use std::fmt;

/// Represents a position in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Byte offset from the start of the source file
    pub offset: usize,
}

/// Represents a single frame in a JavaScript call stack.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame::new("fetchData", "file:///main.js", 25, 10);
///
/// assert_eq!(frame.to_string(), "fetchData@file:///main.js:25:10");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the function, or None for anonymous functions
    pub function_name: Option<String>,
    /// URL or file path of the source, or None if not available
    pub source_url: Option<String>,
    /// Line number where the call occurred
    pub line: u32,
    /// Column number where the call occurred
    pub column: u32,
}

impl StackFrame {
    /// Creates a named frame with a known source.
    pub fn new(
        function_name: impl Into<String>,
        source_url: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            function_name: Some(function_name.into()),
            source_url: Some(source_url.into()),
            line,
            column,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}:{}",
            self.function_name.as_deref().unwrap_or(""),
            self.source_url.as_deref().unwrap_or("<unknown>"),
            self.line,
            self.column
        )
    }
}

/// A stack captured at some point of execution, innermost frame first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedStack {
    frames: Vec<StackFrame>,
}

impl SavedStack {
    /// Wraps a list of frames, innermost first.
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    /// Frames of the capture, innermost first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Returns true if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// One frame per line, in the `SavedFrame` text format.
impl fmt::Display for SavedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            writeln!(f, "{}", frame)?;
        }
        Ok(())
    }
}
