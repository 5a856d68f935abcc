//! Unhandled-rejection tracking.
//!
//! The engine reports two raw events to the context's tracker: a promise
//! was rejected while nothing observed its rejection (`Unhandled`), and a
//! promise previously reported that way got a rejection handler (`Handled`).
//! Tracking is purely observational.

use crate::context::Context;
use crate::promise::{Promise, WeakPromise};
use core_types::Value;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Raw rejection-tracking event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromiseRejectionHandlingState {
    /// Rejected with no rejection-observing reaction attached
    Unhandled,
    /// A rejection-observing reaction was attached after the fact
    Handled,
}

/// Receives rejection-tracking events for one context.
pub trait PromiseRejectionTracker {
    /// Called when a rejection becomes unhandled or later gets handled.
    fn track(&self, cx: &Context, promise: &Promise, state: PromiseRejectionHandlingState);

    /// Called when the context finished draining its job queue.
    fn turn_completed(&self, _cx: &Context) {}
}

impl<F> PromiseRejectionTracker for F
where
    F: Fn(&Context, &Promise, PromiseRejectionHandlingState),
{
    fn track(&self, cx: &Context, promise: &Promise, state: PromiseRejectionHandlingState) {
        self(cx, promise, state)
    }
}

/// One user-visible rejection notification.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectionReport {
    /// Id of the rejected promise
    pub promise_id: u64,
    /// Its rejection reason
    pub reason: Value,
    /// Whether the rejection went unhandled or was handled late
    pub state: PromiseRejectionHandlingState,
}

impl RejectionReport {
    fn new(promise: &Promise, state: PromiseRejectionHandlingState) -> Self {
        Self {
            promise_id: promise.id(),
            reason: promise.result().unwrap_or(Value::Undefined),
            state,
        }
    }
}

/// Tracker that batches unhandled rejections per turn.
///
/// A rejection is only reported `Unhandled` if it is still unhandled when
/// the turn completes. Attaching a handler before that cancels it without
/// any report; attaching one after the report produces a `Handled` report.
///
/// Reported promises are held weakly: one that is dropped without ever
/// getting a handler stops counting as outstanding.
///
/// # Examples
///
/// ```
/// use promise_engine::{Context, ContextCallbacks, PromiseRejectionHandlingState, RejectionLog};
/// use core_types::Value;
///
/// let log = RejectionLog::new();
/// let cx = Context::builder()
///     .callbacks(ContextCallbacks::default().with_rejection_tracker(log.clone()))
///     .build();
///
/// let promise = cx.new_promise();
/// cx.reject(&promise, Value::from("lost"));
/// cx.run_jobs();
///
/// let reports = log.take_reports();
/// assert_eq!(reports.len(), 1);
/// assert_eq!(reports[0].state, PromiseRejectionHandlingState::Unhandled);
/// ```
#[derive(Debug, Default)]
pub struct RejectionLog {
    about_to_be_notified: RefCell<Vec<Promise>>,
    outstanding: RefCell<HashMap<u64, WeakPromise>>,
    reports: RefCell<Vec<RejectionReport>>,
}

impl RejectionLog {
    /// Creates an empty log, ready to be installed as a tracker.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Reports produced so far.
    pub fn reports(&self) -> Vec<RejectionReport> {
        self.reports.borrow().clone()
    }

    /// Reports produced so far, clearing the log.
    pub fn take_reports(&self) -> Vec<RejectionReport> {
        std::mem::take(&mut *self.reports.borrow_mut())
    }

    /// Live promises reported unhandled that still have no handler.
    pub fn outstanding_count(&self) -> usize {
        self.outstanding
            .borrow()
            .values()
            .filter(|promise| promise.is_alive())
            .count()
    }

    /// Handles to the promises counted by [`RejectionLog::outstanding_count`].
    pub fn outstanding(&self) -> Vec<Promise> {
        self.outstanding
            .borrow()
            .values()
            .filter_map(WeakPromise::upgrade)
            .collect()
    }
}

impl PromiseRejectionTracker for RejectionLog {
    fn track(&self, _cx: &Context, promise: &Promise, state: PromiseRejectionHandlingState) {
        match state {
            PromiseRejectionHandlingState::Unhandled => {
                self.about_to_be_notified.borrow_mut().push(promise.clone());
            }
            PromiseRejectionHandlingState::Handled => {
                {
                    let mut pending = self.about_to_be_notified.borrow_mut();
                    if let Some(index) = pending.iter().position(|p| p.ptr_eq(promise)) {
                        pending.remove(index);
                        return;
                    }
                }
                if self.outstanding.borrow_mut().remove(&promise.id()).is_some() {
                    tracing::debug!(promise = promise.id(), "rejection handled late");
                    self.reports.borrow_mut().push(RejectionReport::new(promise, state));
                }
            }
        }
    }

    fn turn_completed(&self, _cx: &Context) {
        self.outstanding.borrow_mut().retain(|_, promise| promise.is_alive());
        let pending = std::mem::take(&mut *self.about_to_be_notified.borrow_mut());
        for promise in pending {
            if promise.is_handled() {
                continue;
            }
            tracing::debug!(promise = promise.id(), "unhandled rejection");
            self.reports
                .borrow_mut()
                .push(RejectionReport::new(&promise, PromiseRejectionHandlingState::Unhandled));
            self.outstanding
                .borrow_mut()
                .insert(promise.id(), promise.downgrade());
        }
    }
}
