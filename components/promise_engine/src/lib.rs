//! Asynchronous promise engine.
//!
//! This crate provides the promise machinery of a JavaScript-like runtime:
//! - Promise state machine with write-once settlement and thenable adoption
//! - Reaction scheduling onto a per-context FIFO job queue, with an
//!   optional in-place path for continuations on an empty queue
//! - Cross-thread dispatch with one-way shutdown
//! - Unhandled-rejection tracking
//! - The wait-for-all combinator
//!
//! # Overview
//!
//! - [`Context`] - One execution context: owns the job queue and dispatcher
//! - [`Promise`] - Handle to a promise owned by a context
//! - [`Dispatcher`] - Thread-safe entry point for cross-thread work
//! - [`RejectionLog`] - Turn-batched unhandled-rejection reporting
//! - [`EventLoop`] - Reference embedding that drains the queues
//!
//! # Examples
//!
//! ```
//! use promise_engine::{Context, PromiseState};
//! use core_types::Value;
//!
//! let cx = Context::new();
//! let (a, b) = (cx.new_promise(), cx.new_promise());
//! let all = cx.wait_for_all(&[a.to_value(), b.to_value()]);
//!
//! cx.resolve(&b, Value::Smi(2));
//! cx.resolve(&a, Value::Smi(1));
//! cx.run_jobs();
//!
//! assert_eq!(all.state(), PromiseState::Fulfilled);
//! assert_eq!(all.result(), Some(Value::Array(vec![Value::Smi(1), Value::Smi(2)])));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinator;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event_loop;
pub mod job_queue;
pub mod offthread;
pub mod options;
pub mod promise;
pub mod rejection;
mod scheduler;

// Re-export main types at crate root
pub use context::{
    Context, ContextBuilder, ContextCallbacks, IncumbentGlobalCallback, JobEnqueuer,
    PromisePrototype,
};
pub use dispatch::{
    dispatchable, DispatchReceiver, DispatchState, DispatchToEventLoop, Dispatchable, Dispatcher,
    MaybeShuttingDown,
};
pub use error::{PromiseError, PromiseResult};
pub use event_loop::{EventLoop, Task, TaskQueue};
pub use job_queue::{Job, JobKind, JobQueue};
pub use offthread::OffThreadPromiseTask;
pub use options::{ContextOptions, ReactionScheduling};
pub use promise::{
    as_promise, is_promise_object, promise_id, promise_is_handled, promise_result, promise_state,
    promise_user_input_state, set_promise_user_input_state, Function, Promise, PromiseReaction,
    PromiseState, ResolvingFunctions, SettleOutcome, Thenable, UserInputState,
};
pub use rejection::{PromiseRejectionHandlingState, PromiseRejectionTracker, RejectionLog, RejectionReport};
