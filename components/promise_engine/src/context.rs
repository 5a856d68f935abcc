//! Execution context.
//!
//! A [`Context`] is one logical thread of JavaScript-like execution. It
//! owns exactly one job queue and one dispatcher, and all promise state
//! changes for its promises happen on its thread. The handle is cheap to
//! clone and is not `Send`; other threads interact with it only through its
//! [`Dispatcher`].

use crate::dispatch::{DispatchReceiver, Dispatcher, DispatchToEventLoop};
use crate::error::PromiseResult;
use crate::job_queue::{Job, JobQueue};
use crate::options::{ContextOptions, ReactionScheduling};
use crate::promise::{as_promise, Function, Promise, ResolvingFunctions, SettleOutcome};
use crate::rejection::{PromiseRejectionHandlingState, PromiseRejectionTracker};
use crate::scheduler;
use core_types::{SavedStack, StackFrame, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Resolves the incumbent global for a newly registered reaction.
pub type IncumbentGlobalCallback = Rc<dyn Fn(&Context) -> Option<Value>>;

/// Embedding hook that takes over job enqueuing.
pub trait JobEnqueuer {
    /// Takes ownership of `job`, arranging for `job.run(cx)` later.
    ///
    /// Handing the job back makes the context fall back to its own queue.
    fn enqueue(&self, cx: &Context, job: Job) -> Result<(), Job>;

    /// Whether the embedding's queue is empty right now, if it can tell.
    ///
    /// The in-place reaction path is only taken when this returns
    /// `Some(true)`.
    fn is_empty(&self) -> Option<bool> {
        None
    }
}

/// The three embedding callback slots of a context.
#[derive(Clone, Default)]
pub struct ContextCallbacks {
    /// Incumbent-global resolution
    pub incumbent_global: Option<IncumbentGlobalCallback>,
    /// Job enqueuing; the context's own queue is used when absent
    pub job_enqueuer: Option<Rc<dyn JobEnqueuer>>,
    /// Rejection tracking
    pub rejection_tracker: Option<Rc<dyn PromiseRejectionTracker>>,
}

impl ContextCallbacks {
    /// Set the incumbent-global callback
    pub fn with_incumbent_global(mut self, callback: IncumbentGlobalCallback) -> Self {
        self.incumbent_global = Some(callback);
        self
    }

    /// Set the job enqueuer
    pub fn with_job_enqueuer(mut self, enqueuer: Rc<dyn JobEnqueuer>) -> Self {
        self.job_enqueuer = Some(enqueuer);
        self
    }

    /// Set the rejection tracker
    pub fn with_rejection_tracker(mut self, tracker: Rc<dyn PromiseRejectionTracker>) -> Self {
        self.rejection_tracker = Some(tracker);
        self
    }
}

impl std::fmt::Debug for ContextCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCallbacks")
            .field("incumbent_global", &self.incumbent_global.is_some())
            .field("job_enqueuer", &self.job_enqueuer.is_some())
            .field("rejection_tracker", &self.rejection_tracker.is_some())
            .finish()
    }
}

/// Marker object behind [`Context::promise_prototype`].
#[derive(Debug, Clone, Copy)]
pub struct PromisePrototype;

/// Builder for [`Context`].
#[derive(Default)]
pub struct ContextBuilder {
    options: ContextOptions,
    callbacks: ContextCallbacks,
    gateway: Option<Dispatcher>,
}

impl ContextBuilder {
    /// Use the given options
    pub fn options(mut self, options: ContextOptions) -> Self {
        self.options = options;
        self
    }

    /// Install the given callbacks
    pub fn callbacks(mut self, callbacks: ContextCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Route cross-thread dispatch through an embedding gateway instead of
    /// the built-in channel.
    pub fn dispatch_gateway<G>(mut self, gateway: G) -> Self
    where
        G: DispatchToEventLoop + 'static,
    {
        self.gateway = Some(Dispatcher::new(gateway));
        self
    }

    /// Creates the context.
    pub fn build(self) -> Context {
        let (dispatcher, dispatch_receiver) = match self.gateway {
            Some(dispatcher) => (dispatcher, None),
            None => {
                let (dispatcher, receiver) = Dispatcher::internal();
                (dispatcher, Some(receiver))
            }
        };
        Context {
            inner: Rc::new(ContextInner {
                options: self.options,
                callbacks: RefCell::new(self.callbacks),
                job_queue: RefCell::new(JobQueue::new()),
                dispatcher,
                dispatch_receiver,
                off_thread: RefCell::new(HashMap::new()),
                current_stack: RefCell::new(SavedStack::default()),
                prototype: Value::native(PromisePrototype),
            }),
        }
    }
}

struct ContextInner {
    options: ContextOptions,
    callbacks: RefCell<ContextCallbacks>,
    job_queue: RefCell<JobQueue>,
    dispatcher: Dispatcher,
    dispatch_receiver: Option<DispatchReceiver>,
    off_thread: RefCell<HashMap<u64, Promise>>,
    current_stack: RefCell<SavedStack>,
    prototype: Value,
}

/// Handle to an execution context.
///
/// # Examples
///
/// ```
/// use promise_engine::{Context, Function, PromiseState};
/// use core_types::Value;
///
/// let cx = Context::new();
/// let promise = cx.new_promise_with_executor(|functions| {
///     functions.resolve(Value::Smi(20));
///     Ok(())
/// });
/// let doubled = cx.then(
///     &promise,
///     Some(Function::new(|args| match args.first() {
///         Some(Value::Smi(n)) => Ok(Value::Smi(n * 2 + 2)),
///         _ => Ok(Value::Undefined),
///     })),
///     None,
/// );
///
/// cx.run_jobs();
/// assert_eq!(doubled.state(), PromiseState::Fulfilled);
/// assert_eq!(doubled.result(), Some(Value::Smi(42)));
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

/// Non-owning context handle for state the context's own queue may keep
/// alive, such as resolving functions captured by reactions.
#[derive(Clone)]
pub(crate) struct WeakContext {
    inner: Weak<ContextInner>,
}

impl WeakContext {
    pub(crate) fn upgrade(&self) -> Option<Context> {
        self.inner.upgrade().map(|inner| Context { inner })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a context with default options, no callbacks and the
    /// built-in dispatch queue.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a context.
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Options the context was built with.
    pub fn options(&self) -> &ContextOptions {
        &self.inner.options
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles refer to the same context.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // --- callback registration ---

    /// Replaces the incumbent-global callback.
    pub fn set_incumbent_global_callback(&self, callback: Option<IncumbentGlobalCallback>) {
        self.inner.callbacks.borrow_mut().incumbent_global = callback;
    }

    /// Replaces the job enqueuer.
    pub fn set_job_enqueuer(&self, enqueuer: Option<Rc<dyn JobEnqueuer>>) {
        self.inner.callbacks.borrow_mut().job_enqueuer = enqueuer;
    }

    /// Replaces the rejection tracker.
    pub fn set_rejection_tracker(&self, tracker: Option<Rc<dyn PromiseRejectionTracker>>) {
        self.inner.callbacks.borrow_mut().rejection_tracker = tracker;
    }

    pub(crate) fn incumbent_global(&self) -> Option<Value> {
        let callback = self.inner.callbacks.borrow().incumbent_global.clone();
        callback.and_then(|callback| callback(self))
    }

    // --- construction and settlement ---

    /// Creates a pending promise.
    pub fn new_promise(&self) -> Promise {
        Promise::new_pending(self.capture_stack())
    }

    /// Creates a promise and runs `executor` synchronously with its
    /// resolving functions. An `Err` from the executor rejects the promise
    /// unless it was already resolved.
    pub fn new_promise_with_executor<F>(&self, executor: F) -> Promise
    where
        F: FnOnce(&ResolvingFunctions) -> Result<(), Value>,
    {
        let promise = self.new_promise();
        let functions = ResolvingFunctions::primary(self, &promise);
        if let Err(thrown) = executor(&functions) {
            functions.reject(thrown);
        }
        promise
    }

    /// The resolving functions stored on `promise`.
    pub fn resolving_functions(&self, promise: &Promise) -> ResolvingFunctions {
        ResolvingFunctions::primary(self, promise)
    }

    /// Resolves `promise` through its own resolving functions.
    pub fn resolve(&self, promise: &Promise, value: Value) -> SettleOutcome {
        ResolvingFunctions::primary(self, promise).resolve(value)
    }

    /// Rejects `promise` through its own resolving functions.
    pub fn reject(&self, promise: &Promise, reason: Value) -> SettleOutcome {
        ResolvingFunctions::primary(self, promise).reject(reason)
    }

    /// Resolves the promise held by `promise`.
    pub fn resolve_promise(&self, promise: &Value, value: Value) -> PromiseResult<SettleOutcome> {
        Ok(self.resolve(&as_promise(promise)?, value))
    }

    /// Rejects the promise held by `promise`.
    pub fn reject_promise(&self, promise: &Value, reason: Value) -> PromiseResult<SettleOutcome> {
        Ok(self.reject(&as_promise(promise)?, reason))
    }

    /// `Promise.resolve`: returns `value` itself if it is a promise,
    /// otherwise a new promise resolved with it.
    pub fn promise_resolve(&self, value: Value) -> Promise {
        if let Some(promise) = Promise::from_value(&value) {
            return promise;
        }
        let promise = self.new_promise();
        self.resolve(&promise, value);
        promise
    }

    /// `Promise.reject`: a new promise rejected with `reason`.
    pub fn promise_reject(&self, reason: Value) -> Promise {
        let promise = self.new_promise();
        self.reject(&promise, reason);
        promise
    }

    /// The context's Promise constructor.
    pub fn promise_constructor(&self) -> Value {
        Value::NativeFunction("Promise".to_string())
    }

    /// The context's Promise prototype; the same object on every call.
    pub fn promise_prototype(&self) -> Value {
        self.inner.prototype.clone()
    }

    // --- chaining ---

    /// `Promise.prototype.then`: registers a reaction and returns the
    /// derived promise that receives the handler's outcome.
    pub fn then(
        &self,
        promise: &Promise,
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
    ) -> Promise {
        let derived = self.new_promise();
        if self.inner.options.propagate_user_input {
            derived.set_user_input_state(promise.user_input_state());
        }
        scheduler::perform_then(self, promise, on_fulfilled, on_rejected, Some(derived.clone()));
        derived
    }

    /// Registers a reaction without creating a derived promise.
    pub fn add_reactions(
        &self,
        promise: &Promise,
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
    ) {
        scheduler::perform_then(self, promise, on_fulfilled, on_rejected, None);
    }

    /// [`Context::then`] on a value; fails if it is not a promise.
    pub fn call_original_then(
        &self,
        promise: &Value,
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
    ) -> PromiseResult<Promise> {
        Ok(self.then(&as_promise(promise)?, on_fulfilled, on_rejected))
    }

    /// [`Context::add_reactions`] on a value; fails if it is not a promise.
    pub fn add_promise_reactions(
        &self,
        promise: &Value,
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
    ) -> PromiseResult<()> {
        self.add_reactions(&as_promise(promise)?, on_fulfilled, on_rejected);
        Ok(())
    }

    // --- job queue ---

    /// Hands `job` to the embedding enqueuer, or appends it to the
    /// context's own queue. Either way the "queue may be empty" signal is
    /// cleared first.
    pub fn enqueue_job(&self, job: Job) {
        self.inner.job_queue.borrow_mut().set_may_be_empty(false);
        let enqueuer = self.inner.callbacks.borrow().job_enqueuer.clone();
        let job = match enqueuer {
            Some(enqueuer) => match enqueuer.enqueue(self, job) {
                Ok(()) => return,
                Err(job) => {
                    tracing::warn!(?job, "embedding refused job; using the context queue");
                    job
                }
            },
            None => job,
        };
        tracing::trace!(?job, "job enqueued");
        self.inner.job_queue.borrow_mut().enqueue(job);
    }

    /// Runs the oldest queued job. Returns false if the queue was empty.
    pub fn run_next_job(&self) -> bool {
        let job = self.inner.job_queue.borrow_mut().dequeue();
        match job {
            Some(job) => {
                job.run(self);
                true
            }
            None => false,
        }
    }

    /// Drains dispatched work and the job queue in FIFO order until both
    /// are empty, then tells the rejection tracker the turn completed.
    /// Returns the number of jobs and dispatchables run.
    pub fn run_jobs(&self) -> usize {
        let mut ran = 0;
        loop {
            let mut round = self.run_dispatched();
            while self.run_next_job() {
                round += 1;
            }
            if round == 0 {
                break;
            }
            ran += round;
        }
        self.notify_turn_completed();
        ran
    }

    /// Number of jobs in the context's own queue.
    pub fn pending_job_count(&self) -> usize {
        self.inner.job_queue.borrow().len()
    }

    /// Signals that the embedding is about to run its last queued job.
    ///
    /// Must be balanced by [`Context::job_queue_may_not_be_empty`].
    pub fn job_queue_is_empty(&self) {
        self.inner.job_queue.borrow_mut().set_may_be_empty(true);
    }

    /// Restores normal queuing after [`Context::job_queue_is_empty`].
    pub fn job_queue_may_not_be_empty(&self) {
        self.inner.job_queue.borrow_mut().set_may_be_empty(false);
    }

    /// Whether a reaction on a settled promise may run in place right now.
    ///
    /// Requires the fast-path option, the embedding's empty signal, and a
    /// queue that is actually empty at this instant.
    pub(crate) fn fast_path_available(&self) -> bool {
        if self.inner.options.reaction_scheduling != ReactionScheduling::FastPath {
            return false;
        }
        if !self.inner.job_queue.borrow().verified_empty() {
            return false;
        }
        let enqueuer = self.inner.callbacks.borrow().job_enqueuer.clone();
        match enqueuer {
            Some(enqueuer) => enqueuer.is_empty() == Some(true),
            None => true,
        }
    }

    // --- dispatch ---

    /// Thread-safe dispatch handle for this context.
    pub fn dispatcher(&self) -> Dispatcher {
        self.inner.dispatcher.clone()
    }

    /// Runs every dispatchable waiting in the built-in queue. Returns how
    /// many ran; always 0 when an embedding gateway is installed.
    pub fn run_dispatched(&self) -> usize {
        let Some(receiver) = &self.inner.dispatch_receiver else {
            return 0;
        };
        let mut ran = 0;
        while let Some(dispatchable) = receiver.try_next() {
            dispatchable.run(self, self.inner.dispatcher.maybe_shutting_down());
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for one dispatchable and runs it.
    ///
    /// This blocks the calling thread and is meant for the embedding's
    /// event loop, never for code running inside a job.
    pub fn wait_for_dispatch(&self, timeout: Duration) -> bool {
        let Some(receiver) = &self.inner.dispatch_receiver else {
            return false;
        };
        match receiver.next_timeout(timeout) {
            Some(dispatchable) => {
                dispatchable.run(self, self.inner.dispatcher.maybe_shutting_down());
                true
            }
            None => false,
        }
    }

    /// Stops accepting dispatches, runs already-accepted ones in shutdown
    /// mode and releases every live off-thread task. Idempotent.
    pub fn shutdown_async_tasks(&self) {
        if self.inner.dispatcher.shutdown() {
            tracing::debug!("shutting down async tasks");
        }
        self.run_dispatched();
        let released = self.inner.off_thread.borrow_mut().drain().count();
        if released > 0 {
            tracing::debug!(released, "released off-thread tasks");
        }
    }

    pub(crate) fn register_off_thread(&self, id: u64, promise: Promise) {
        self.inner.off_thread.borrow_mut().insert(id, promise);
    }

    pub(crate) fn take_off_thread(&self, id: u64) -> Option<Promise> {
        self.inner.off_thread.borrow_mut().remove(&id)
    }

    /// Number of off-thread tasks whose promise is still registered.
    pub fn live_off_thread_tasks(&self) -> usize {
        self.inner.off_thread.borrow().len()
    }

    // --- rejection tracking ---

    pub(crate) fn track_rejection(&self, promise: &Promise, state: PromiseRejectionHandlingState) {
        tracing::trace!(promise = promise.id(), ?state, "rejection tracking");
        let tracker = self.inner.callbacks.borrow().rejection_tracker.clone();
        if let Some(tracker) = tracker {
            tracker.track(self, promise, state);
        }
    }

    /// Tells the rejection tracker that the current turn is over.
    pub fn notify_turn_completed(&self) {
        let tracker = self.inner.callbacks.borrow().rejection_tracker.clone();
        if let Some(tracker) = tracker {
            tracker.turn_completed(self);
        }
    }

    // --- diagnostics ---

    /// Sets the stack recorded by promises created or settled from now on,
    /// innermost frame first.
    pub fn set_current_stack(&self, frames: Vec<StackFrame>) {
        *self.inner.current_stack.borrow_mut() = SavedStack::new(frames);
    }

    pub(crate) fn capture_stack(&self) -> Option<SavedStack> {
        self.inner
            .options
            .capture_async_stacks
            .then(|| self.inner.current_stack.borrow().clone())
    }

    /// Logs where `promise` was allocated.
    pub fn dump_allocation_site(&self, promise: &Promise) {
        match promise.allocation_site() {
            Some(site) => tracing::debug!(promise = promise.id(), "allocation site:\n{}", site),
            None => tracing::debug!(promise = promise.id(), "no allocation site captured"),
        }
    }

    /// Logs where `promise` was settled.
    pub fn dump_resolution_site(&self, promise: &Promise) {
        match promise.resolution_site() {
            Some(site) => tracing::debug!(promise = promise.id(), "resolution site:\n{}", site),
            None => tracing::debug!(promise = promise.id(), "no resolution site captured"),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("options", &self.inner.options)
            .field("pending_jobs", &self.inner.job_queue.try_borrow().map(|q| q.len()).ok())
            .field("dispatcher", &self.inner.dispatcher)
            .finish_non_exhaustive()
    }
}
