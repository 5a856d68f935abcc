//! Reference event loop embedding.
//!
//! The engine never drains its own queue; an embedding does. [`EventLoop`]
//! is that embedding in its simplest form. Each turn:
//! 1. Runs dispatchables that arrived from other threads
//! 2. Takes the oldest task from the task queue and executes it
//! 3. Performs a microtask checkpoint, draining the job queue
//! 4. Tells the rejection tracker the turn is over
//!
//! During the checkpoint it signals `job_queue_is_empty` right before the
//! last queued job, which lets a context configured with
//! [`ReactionScheduling::FastPath`](crate::ReactionScheduling) run
//! continuations in place.

use crate::context::Context;
use crate::promise::{Promise, PromiseState};
use core_types::Completion;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A macrotask to be executed by the event loop.
///
/// An `Err` completion is an uncaught exception: it is logged and the loop
/// carries on.
pub struct Task {
    callback: Box<dyn FnOnce(&Context) -> Completion>,
}

impl Task {
    /// Creates a new Task from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&Context) -> Completion + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the task.
    pub fn run(self, cx: &Context) -> Completion {
        (self.callback)(cx)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task {{ ... }}")
    }
}

/// A queue for tasks.
///
/// Tasks are processed in FIFO order, one per turn.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<Task>,
}

impl TaskQueue {
    /// Creates a new empty TaskQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task to the end of the queue.
    pub fn enqueue(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    /// Removes and returns the next task from the queue.
    pub fn dequeue(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Event loop driving one context.
///
/// # Examples
///
/// ```
/// use promise_engine::{EventLoop, Function, Task};
/// use core_types::Value;
///
/// let mut event_loop = EventLoop::new();
/// event_loop.enqueue_task(Task::new(|cx| {
///     let promise = cx.promise_resolve(Value::Smi(1));
///     cx.add_reactions(&promise, Some(Function::new(|_| Ok(Value::Undefined))), None);
///     Ok(Value::Undefined)
/// }));
///
/// event_loop.run_until_done();
/// assert!(event_loop.is_idle());
/// ```
#[derive(Debug)]
pub struct EventLoop {
    context: Context,
    task_queue: TaskQueue,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Creates an event loop around a fresh default context.
    pub fn new() -> Self {
        Self::with_context(Context::new())
    }

    /// Creates an event loop driving `context`.
    pub fn with_context(context: Context) -> Self {
        Self {
            context,
            task_queue: TaskQueue::new(),
        }
    }

    /// The driven context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&mut self, task: Task) {
        self.task_queue.enqueue(task);
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.task_queue.is_empty()
    }

    /// Returns true if no task and no job is waiting.
    pub fn is_idle(&self) -> bool {
        self.task_queue.is_empty() && self.context.pending_job_count() == 0
    }

    /// Runs every queued job, signalling the last one to the context.
    ///
    /// Jobs enqueued by running jobs are drained too. Returns the number of
    /// jobs run.
    pub fn perform_microtask_checkpoint(&mut self) -> usize {
        let cx = &self.context;
        let mut ran = 0;
        loop {
            let pending = cx.pending_job_count();
            if pending == 0 {
                break;
            }
            let last = pending == 1;
            if last {
                cx.job_queue_is_empty();
            }
            cx.run_next_job();
            if last {
                cx.job_queue_may_not_be_empty();
            }
            ran += 1;
        }
        cx.notify_turn_completed();
        ran
    }

    /// Processes one complete cycle: dispatched work, one task, then all
    /// microtasks. Returns false if there was nothing to do.
    pub fn process_one_cycle(&mut self) -> bool {
        let mut worked = self.context.run_dispatched() > 0;

        if let Some(task) = self.task_queue.dequeue() {
            worked = true;
            if let Err(exception) = task.run(&self.context) {
                tracing::warn!(%exception, "uncaught exception in task");
            }
        }

        worked |= self.perform_microtask_checkpoint() > 0;
        worked
    }

    /// Runs the event loop until no task, job or dispatched work remains.
    ///
    /// Returns the number of cycles that did work.
    pub fn run_until_done(&mut self) -> usize {
        let mut cycles = 0;
        while self.process_one_cycle() {
            cycles += 1;
        }
        cycles
    }

    /// Runs until `promise` settles, waiting for cross-thread dispatches
    /// when idle. Gives up after `timeout` and returns the state reached.
    pub fn run_until_settled(&mut self, promise: &Promise, timeout: Duration) -> PromiseState {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_until_done();
            if promise.state() != PromiseState::Pending {
                return promise.state();
            }
            let now = Instant::now();
            if now >= deadline || !self.context.wait_for_dispatch(deadline - now) {
                return promise.state();
            }
        }
    }
}
