//! Promises settled by work running on other threads.
//!
//! An [`OffThreadPromiseTask`] is the `Send` half of a promise: a worker
//! thread computes a result and dispatches its resolution back to the
//! owning context. The promise itself never leaves the context's thread;
//! the task only carries its registry id.

use crate::context::Context;
use crate::dispatch::{dispatchable, Dispatcher, MaybeShuttingDown};
use crate::error::PromiseResult;
use crate::promise::Promise;
use core_types::Completion;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Sendable handle that settles one promise from any thread.
///
/// # Examples
///
/// ```
/// use promise_engine::{Context, PromiseState};
/// use core_types::Value;
///
/// let cx = Context::new();
/// let (promise, task) = cx.new_off_thread_promise();
///
/// std::thread::spawn(move || {
///     let sum: i32 = (1..=8).sum();
///     task.dispatch_resolution(move |_cx| Ok(Value::Smi(sum))).unwrap();
/// })
/// .join()
/// .unwrap();
///
/// cx.run_jobs();
/// assert_eq!(promise.state(), PromiseState::Fulfilled);
/// assert_eq!(promise.result(), Some(Value::Smi(36)));
/// ```
#[derive(Debug)]
pub struct OffThreadPromiseTask {
    id: u64,
    dispatcher: Dispatcher,
}

impl OffThreadPromiseTask {
    /// Registry id of the task.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Dispatches the settlement back to the owning context.
    ///
    /// `settle` runs on the context's thread and produces the resolution
    /// value (`Ok`) or rejection reason (`Err`). If the context is shutting
    /// down when the dispatch runs, `settle` is skipped and the promise is
    /// released unsettled. Fails with `DispatchRejected` after shutdown.
    pub fn dispatch_resolution<F>(self, settle: F) -> PromiseResult<()>
    where
        F: FnOnce(&Context) -> Completion + Send + 'static,
    {
        let id = self.id;
        self.dispatcher
            .request_dispatch(dispatchable(move |cx, maybe_shutting_down| {
                let Some(promise) = cx.take_off_thread(id) else {
                    return;
                };
                if maybe_shutting_down == MaybeShuttingDown::ShuttingDown {
                    tracing::debug!(task = id, promise = promise.id(), "off-thread task abandoned");
                    return;
                }
                match settle(cx) {
                    Ok(value) => cx.resolve(&promise, value),
                    Err(reason) => cx.reject(&promise, reason),
                };
            }))
    }
}

impl Context {
    /// Creates a pending promise together with the task that settles it.
    ///
    /// The promise stays registered until the task's dispatch runs or the
    /// context shuts down.
    pub fn new_off_thread_promise(&self) -> (Promise, OffThreadPromiseTask) {
        let promise = self.new_promise();
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        self.register_off_thread(id, promise.clone());
        let task = OffThreadPromiseTask {
            id,
            dispatcher: self.dispatcher(),
        };
        (promise, task)
    }
}
