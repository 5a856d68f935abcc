//! Unit tests for rejection tracking

use core_types::Value;
use promise_engine::{
    Context, ContextCallbacks, Function, Promise, PromiseRejectionHandlingState, RejectionLog,
};
use std::cell::RefCell;
use std::rc::Rc;

type Events = Rc<RefCell<Vec<(u64, PromiseRejectionHandlingState)>>>;

fn context_with_recorder() -> (Context, Events) {
    let events: Events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    let cx = Context::builder()
        .callbacks(ContextCallbacks::default().with_rejection_tracker(Rc::new(
            move |_: &Context, promise: &Promise, state: PromiseRejectionHandlingState| {
                sink.borrow_mut().push((promise.id(), state));
            },
        )))
        .build();
    (cx, events)
}

fn noop() -> Function {
    Function::new(|_| Ok(Value::Undefined))
}

#[test]
fn rejection_without_handler_is_unhandled() {
    let (cx, events) = context_with_recorder();
    let p = cx.promise_reject(Value::from("oops"));
    assert_eq!(*events.borrow(), vec![(p.id(), PromiseRejectionHandlingState::Unhandled)]);
    assert!(!p.is_handled());
}

#[test]
fn rejection_with_pending_handler_is_not_tracked() {
    let (cx, events) = context_with_recorder();
    let p = cx.new_promise();
    cx.add_reactions(&p, None, Some(noop()));
    assert!(p.is_handled());
    cx.reject(&p, Value::from("oops"));
    cx.run_jobs();
    assert!(events.borrow().is_empty());
}

#[test]
fn late_handler_reports_handled_once() {
    let (cx, events) = context_with_recorder();
    let p = cx.promise_reject(Value::from("oops"));
    cx.add_reactions(&p, None, Some(noop()));
    cx.add_reactions(&p, None, Some(noop()));
    assert_eq!(
        *events.borrow(),
        vec![
            (p.id(), PromiseRejectionHandlingState::Unhandled),
            (p.id(), PromiseRejectionHandlingState::Handled)
        ]
    );
}

#[test]
fn fulfillment_only_reaction_does_not_handle() {
    let (cx, events) = context_with_recorder();
    let p = cx.promise_reject(Value::from("oops"));
    cx.add_reactions(&p, Some(noop()), None);
    assert!(!p.is_handled());
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn then_without_handlers_handles_and_forwards() {
    let (cx, events) = context_with_recorder();
    let p = cx.promise_reject(Value::from("oops"));
    let derived = cx.then(&p, None, None);
    assert!(p.is_handled());
    cx.run_jobs();
    assert_eq!(derived.result(), Some(Value::from("oops")));
    assert_eq!(
        *events.borrow(),
        vec![
            (p.id(), PromiseRejectionHandlingState::Unhandled),
            (p.id(), PromiseRejectionHandlingState::Handled),
            (derived.id(), PromiseRejectionHandlingState::Unhandled)
        ]
    );
}

#[test]
fn log_reports_only_rejections_unhandled_at_turn_end() {
    let log = RejectionLog::new();
    let cx = Context::builder()
        .callbacks(ContextCallbacks::default().with_rejection_tracker(log.clone()))
        .build();
    let handled_in_turn = cx.promise_reject(Value::from("a"));
    let never_handled = cx.promise_reject(Value::from("b"));
    cx.add_reactions(&handled_in_turn, None, Some(noop()));
    cx.run_jobs();

    let reports = log.take_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].promise_id, never_handled.id());
    assert_eq!(reports[0].reason, Value::from("b"));
    assert_eq!(reports[0].state, PromiseRejectionHandlingState::Unhandled);
    assert_eq!(log.outstanding_count(), 1);
}

#[test]
fn tracker_can_be_replaced_at_runtime() {
    let (cx, events) = context_with_recorder();
    cx.set_rejection_tracker(None);
    cx.promise_reject(Value::Null);
    assert!(events.borrow().is_empty());
}

#[test]
fn dropped_unhandled_promise_stops_counting_as_outstanding() {
    let log = RejectionLog::new();
    let cx = Context::builder()
        .callbacks(ContextCallbacks::default().with_rejection_tracker(log.clone()))
        .build();
    let kept = cx.promise_reject(Value::from("kept"));
    let dropped = cx.promise_reject(Value::from("dropped"));
    cx.run_jobs();
    assert_eq!(log.outstanding_count(), 2);

    drop(dropped);
    assert_eq!(log.outstanding_count(), 1);
    assert_eq!(log.outstanding(), vec![kept.clone()]);

    cx.run_jobs();
    cx.add_reactions(&kept, None, Some(noop()));
    assert_eq!(log.outstanding_count(), 0);
    let states: Vec<_> = log.take_reports().into_iter().map(|r| r.state).collect();
    assert_eq!(
        states,
        vec![
            PromiseRejectionHandlingState::Unhandled,
            PromiseRejectionHandlingState::Unhandled,
            PromiseRejectionHandlingState::Handled
        ]
    );
}
