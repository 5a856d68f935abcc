//! Promise jobs and the per-context job queue.
//!
//! Jobs run strictly in the order they were enqueued. A job that enqueues
//! further jobs sees them run after everything already queued.

use crate::context::Context;
use crate::promise::Promise;
use core_types::{SavedStack, Value};
use std::collections::VecDeque;

/// What produced a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Runs one branch of a reaction on a settled promise
    PromiseReaction,
    /// Adopts the state of a promise or thenable used as a resolution value
    PromiseResolveThenable,
    /// Work queued directly by the embedding
    Host,
}

/// A unit of deferred work bound to an execution context.
///
/// Jobs are consumed by [`Job::run`], so each one runs at most once.
pub struct Job {
    kind: JobKind,
    promise: Option<Promise>,
    allocation_site: Option<SavedStack>,
    incumbent_global: Option<Value>,
    callback: Box<dyn FnOnce(&Context)>,
}

impl Job {
    /// Creates a host job from a closure.
    ///
    /// # Arguments
    ///
    /// * `f` - The function to execute when the job runs
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&Context) + 'static,
    {
        Self {
            kind: JobKind::Host,
            promise: None,
            allocation_site: None,
            incumbent_global: None,
            callback: Box::new(f),
        }
    }

    pub(crate) fn for_promise<F>(
        kind: JobKind,
        promise: &Promise,
        incumbent_global: Option<Value>,
        f: F,
    ) -> Self
    where
        F: FnOnce(&Context) + 'static,
    {
        Self {
            kind,
            promise: Some(promise.clone()),
            allocation_site: promise.allocation_site(),
            incumbent_global,
            callback: Box::new(f),
        }
    }

    /// What produced this job.
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// The promise whose settlement (or adoption) created this job.
    pub fn promise(&self) -> Option<&Promise> {
        self.promise.as_ref()
    }

    /// Allocation site of the originating promise, when captured.
    pub fn allocation_site(&self) -> Option<&SavedStack> {
        self.allocation_site.as_ref()
    }

    /// Incumbent global recorded when the reaction was registered.
    pub fn incumbent_global(&self) -> Option<&Value> {
        self.incumbent_global.as_ref()
    }

    /// Executes the job on its owning context.
    pub fn run(self, cx: &Context) {
        tracing::trace!(kind = ?self.kind, promise = ?self.promise.as_ref().map(Promise::id), "running job");
        (self.callback)(cx)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("kind", &self.kind)
            .field("promise", &self.promise.as_ref().map(Promise::id))
            .finish_non_exhaustive()
    }
}

/// FIFO queue of promise jobs.
///
/// Besides the jobs, the queue carries the "queue may be empty" signal set
/// by the embedding before it runs its last job. Enqueuing always clears it.
#[derive(Debug, Default)]
pub struct JobQueue {
    queue: VecDeque<Job>,
    may_be_empty: bool,
}

impl JobQueue {
    /// Creates a new empty JobQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job to the end of the queue, clearing the "may be empty" signal.
    pub fn enqueue(&mut self, job: Job) {
        self.may_be_empty = false;
        self.queue.push_back(job);
    }

    /// Removes and returns the oldest job.
    pub fn dequeue(&mut self) -> Option<Job> {
        self.queue.pop_front()
    }

    /// Returns true if no job is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of queued jobs.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the embedding has signalled that it is running its last job.
    pub fn may_be_empty(&self) -> bool {
        self.may_be_empty
    }

    pub(crate) fn set_may_be_empty(&mut self, value: bool) {
        self.may_be_empty = value;
    }

    /// True only when the signal is set and nothing is queued right now.
    pub fn verified_empty(&self) -> bool {
        self.may_be_empty && self.queue.is_empty()
    }
}
