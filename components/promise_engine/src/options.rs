//! Per-context configuration.
//!
//! Options are fixed when a [`Context`](crate::Context) is built. They can be
//! assembled with the `with_*` builder methods or loaded from JSON.

use crate::error::PromiseResult;
use serde::{Deserialize, Serialize};

/// How reactions attached to already-settled promises are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionScheduling {
    /// Every reaction becomes a job on the queue.
    #[default]
    AlwaysEnqueue,
    /// A reaction attached to a settled promise runs in place when the
    /// embedding has signalled an empty queue and the queue really is empty.
    FastPath,
}

/// Configuration of an execution context.
///
/// # Examples
///
/// ```
/// use promise_engine::{ContextOptions, ReactionScheduling};
///
/// let options = ContextOptions::from_json(r#"{ "reaction_scheduling": "fast_path" }"#).unwrap();
/// assert_eq!(options.reaction_scheduling, ReactionScheduling::FastPath);
/// assert!(options.propagate_user_input);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Reaction scheduling mode
    pub reaction_scheduling: ReactionScheduling,
    /// Record allocation and resolution sites on promises
    pub capture_async_stacks: bool,
    /// Copy the user-input state from a promise to the promises derived from it
    pub propagate_user_input: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            reaction_scheduling: ReactionScheduling::AlwaysEnqueue,
            capture_async_stacks: false,
            propagate_user_input: true,
        }
    }
}

impl ContextOptions {
    /// Parses options from a JSON object; missing fields take their defaults.
    pub fn from_json(json: &str) -> PromiseResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Select the reaction scheduling mode
    pub fn with_reaction_scheduling(mut self, mode: ReactionScheduling) -> Self {
        self.reaction_scheduling = mode;
        self
    }

    /// Enable allocation/resolution site capture
    pub fn with_async_stacks(mut self, enabled: bool) -> Self {
        self.capture_async_stacks = enabled;
        self
    }

    /// Enable or disable user-input state propagation
    pub fn with_user_input_propagation(mut self, enabled: bool) -> Self {
        self.propagate_user_input = enabled;
        self
    }
}
