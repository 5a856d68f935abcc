//! Unit tests for wait_for_all

use core_types::Value;
use promise_engine::{Context, PromiseState, Thenable};

#[test]
fn results_follow_input_order() {
    let cx = Context::new();
    let (p0, p1, p2) = (cx.new_promise(), cx.new_promise(), cx.new_promise());
    let all = cx.wait_for_all(&[p0.to_value(), p1.to_value(), p2.to_value()]);

    cx.resolve(&p1, Value::from("b"));
    cx.run_jobs();
    cx.resolve(&p0, Value::from("a"));
    cx.run_jobs();
    assert_eq!(all.state(), PromiseState::Pending);
    cx.resolve(&p2, Value::from("c"));
    cx.run_jobs();

    assert_eq!(
        all.result(),
        Some(Value::Array(vec![Value::from("a"), Value::from("b"), Value::from("c")]))
    );
}

#[test]
fn first_rejection_wins() {
    let cx = Context::new();
    let (p0, p1) = (cx.new_promise(), cx.new_promise());
    let all = cx.wait_for_all(&[p0.to_value(), p1.to_value()]);
    cx.reject(&p1, Value::from("X"));
    cx.run_jobs();
    cx.reject(&p0, Value::from("Y"));
    cx.resolve(&p0, Value::from("late"));
    cx.run_jobs();
    assert_eq!(all.state(), PromiseState::Rejected);
    assert_eq!(all.result(), Some(Value::from("X")));
}

#[test]
fn empty_input_fulfills_immediately() {
    let cx = Context::new();
    let all = cx.wait_for_all(&[]);
    assert_eq!(all.state(), PromiseState::Fulfilled);
    assert_eq!(all.result(), Some(Value::Array(Vec::new())));
}

#[test]
fn plain_values_and_thenables_are_accepted() {
    let cx = Context::new();
    let thenable = Thenable::new(|functions| {
        functions.resolve(Value::Smi(2));
        Ok(())
    });
    let all = cx.wait_for_all(&[Value::Smi(1), thenable.to_value(), Value::Null]);
    cx.run_jobs();
    assert_eq!(
        all.result(),
        Some(Value::Array(vec![Value::Smi(1), Value::Smi(2), Value::Null]))
    );
}

#[test]
fn inputs_are_marked_handled() {
    let cx = Context::new();
    let p = cx.new_promise();
    let _all = cx.wait_for_all(&[p.to_value()]);
    assert!(p.is_handled());
}
