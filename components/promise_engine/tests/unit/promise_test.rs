//! Unit tests for Promise

use core_types::{ErrorKind, JsError, Value};
use promise_engine::{
    promise_is_handled, promise_result, promise_state, Context, Function, PromiseError,
    PromiseState, SettleOutcome, Thenable, UserInputState,
};

#[test]
fn new_promise_is_pending() {
    let cx = Context::new();
    let promise = cx.new_promise();
    assert_eq!(promise.state(), PromiseState::Pending);
    assert!(promise.result().is_none());
    assert!(!promise.has_pending_reactions());
}

#[test]
fn resolve_sets_result_value() {
    let cx = Context::new();
    let promise = cx.new_promise();
    assert_eq!(cx.resolve(&promise, Value::Smi(42)), SettleOutcome::Fulfilled);
    assert_eq!(promise.state(), PromiseState::Fulfilled);
    assert_eq!(promise.result(), Some(Value::Smi(42)));
}

#[test]
fn reject_sets_reason() {
    let cx = Context::new();
    let promise = cx.new_promise();
    let reason: Value = JsError::type_error("test").into();
    assert_eq!(cx.reject(&promise, reason.clone()), SettleOutcome::Rejected);
    assert_eq!(promise.state(), PromiseState::Rejected);
    assert_eq!(promise.result(), Some(reason));
}

#[test]
fn cannot_resolve_already_fulfilled_promise() {
    let cx = Context::new();
    let promise = cx.new_promise();
    cx.resolve(&promise, Value::Smi(42));
    assert_eq!(cx.resolve(&promise, Value::Smi(100)), SettleOutcome::AlreadyResolved);
    assert_eq!(promise.result(), Some(Value::Smi(42)));
}

#[test]
fn cannot_reject_already_fulfilled_promise() {
    let cx = Context::new();
    let promise = cx.new_promise();
    cx.resolve(&promise, Value::Smi(42));
    assert_eq!(cx.reject(&promise, Value::Null), SettleOutcome::AlreadyResolved);
    assert_eq!(promise.state(), PromiseState::Fulfilled);
}

#[test]
fn cannot_resolve_already_rejected_promise() {
    let cx = Context::new();
    let promise = cx.new_promise();
    cx.reject(&promise, Value::from("no"));
    cx.resolve(&promise, Value::Smi(42));
    assert_eq!(promise.state(), PromiseState::Rejected);
    assert_eq!(promise.result(), Some(Value::from("no")));
}

#[test]
fn executor_receives_working_resolving_functions() {
    let cx = Context::new();
    let promise = cx.new_promise_with_executor(|functions| {
        assert!(!functions.is_resolved());
        functions.reject(Value::from("nope"));
        assert!(functions.is_resolved());
        Ok(())
    });
    assert_eq!(promise.state(), PromiseState::Rejected);
}

#[test]
fn executor_exception_becomes_rejection() {
    let cx = Context::new();
    let promise = cx.new_promise_with_executor(|_| Err(Value::from("thrown")));
    assert_eq!(promise.state(), PromiseState::Rejected);
    assert_eq!(promise.result(), Some(Value::from("thrown")));
}

#[test]
fn adopting_promise_is_locked_in() {
    let cx = Context::new();
    let source = cx.new_promise();
    let follower = cx.new_promise();
    assert_eq!(cx.resolve(&follower, source.to_value()), SettleOutcome::Adopting);
    assert_eq!(cx.resolve(&follower, Value::Smi(1)), SettleOutcome::AlreadyResolved);
    assert_eq!(follower.state(), PromiseState::Pending);

    cx.resolve(&source, Value::from("adopted"));
    cx.run_jobs();
    assert_eq!(follower.result(), Some(Value::from("adopted")));
}

#[test]
fn adopting_rejected_promise_rejects() {
    let cx = Context::new();
    let source = cx.promise_reject(Value::from("bad"));
    let follower = cx.promise_resolve(Value::Smi(0));
    let adopter = cx.new_promise();
    cx.resolve(&adopter, source.to_value());
    cx.run_jobs();
    assert_eq!(adopter.state(), PromiseState::Rejected);
    assert_eq!(adopter.result(), Some(Value::from("bad")));
    assert!(source.is_handled());
    assert_eq!(follower.state(), PromiseState::Fulfilled);
}

#[test]
fn thenable_is_adopted_through_a_job() {
    let cx = Context::new();
    let thenable = Thenable::new(|functions| {
        functions.resolve(Value::from("from thenable"));
        functions.resolve(Value::from("ignored"));
        Ok(())
    });
    let promise = cx.promise_resolve(thenable.to_value());
    assert_eq!(promise.state(), PromiseState::Pending);
    assert_eq!(cx.pending_job_count(), 1);
    cx.run_jobs();
    assert_eq!(promise.result(), Some(Value::from("from thenable")));
}

#[test]
fn throwing_thenable_rejects_unless_resolved() {
    let cx = Context::new();
    let throws = Thenable::new(|_| Err(Value::from("then threw")));
    let resolves_then_throws = Thenable::new(|functions| {
        functions.resolve(Value::Smi(7));
        Err(Value::from("too late"))
    });
    let a = cx.promise_resolve(throws.to_value());
    let b = cx.promise_resolve(resolves_then_throws.to_value());
    cx.run_jobs();
    assert_eq!(a.result(), Some(Value::from("then threw")));
    assert_eq!(b.result(), Some(Value::Smi(7)));
}

#[test]
fn promise_resolve_returns_same_promise() {
    let cx = Context::new();
    let promise = cx.new_promise();
    let again = cx.promise_resolve(promise.to_value());
    assert_eq!(again, promise);
}

#[test]
fn value_level_operations_type_check() {
    let cx = Context::new();
    let not_a_promise = Value::Smi(3);
    assert_eq!(
        cx.resolve_promise(&not_a_promise, Value::Null),
        Err(PromiseError::NotAPromise("number"))
    );
    assert!(cx.reject_promise(&not_a_promise, Value::Null).is_err());
    assert!(cx.call_original_then(&not_a_promise, None, None).is_err());
    assert!(cx.add_promise_reactions(&not_a_promise, None, None).is_err());
    assert!(promise_result(&not_a_promise).is_err());
    assert!(promise_is_handled(&not_a_promise).is_err());
    assert_eq!(promise_state(&not_a_promise), PromiseState::Pending);

    let err: JsError = PromiseError::NotAPromise("number").into();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

#[test]
fn value_level_operations_on_promise() {
    let cx = Context::new();
    let promise = cx.new_promise().to_value();
    assert_eq!(cx.resolve_promise(&promise, Value::Smi(1)), Ok(SettleOutcome::Fulfilled));
    assert_eq!(promise_state(&promise), PromiseState::Fulfilled);
    assert_eq!(promise_result(&promise), Ok(Value::Smi(1)));
}

#[test]
fn pending_result_reads_as_undefined() {
    let cx = Context::new();
    let promise = cx.new_promise().to_value();
    assert_eq!(promise_result(&promise), Ok(Value::Undefined));
}

#[test]
fn user_input_state_propagates_through_then() {
    let cx = Context::new();
    let root = cx.new_promise();
    root.set_user_input_state(UserInputState::HadUserInteractionAtCreation);
    let child = cx.then(&root, None, None);
    let grandchild = cx.then(&child, Some(Function::new(|_| Ok(Value::Undefined))), None);
    assert_eq!(grandchild.user_input_state(), UserInputState::HadUserInteractionAtCreation);
}

#[test]
fn user_input_state_not_propagated_when_disabled() {
    let cx = Context::builder()
        .options(promise_engine::ContextOptions::default().with_user_input_propagation(false))
        .build();
    let root = cx.new_promise();
    root.set_user_input_state(UserInputState::DidntHaveUserInteractionAtCreation);
    let child = cx.then(&root, None, None);
    assert_eq!(child.user_input_state(), UserInputState::DontCare);
}

#[test]
fn then_on_pending_adds_reaction() {
    let cx = Context::new();
    let promise = cx.new_promise();
    let derived = cx.then(&promise, None, None);
    assert_eq!(promise.reaction_count(), 1);
    assert_ne!(derived, promise);
    assert_ne!(derived.id(), promise.id());
}

#[test]
fn settlement_moves_reactions_to_jobs() {
    let cx = Context::new();
    let promise = cx.new_promise();
    let _ = cx.then(&promise, None, None);
    let _ = cx.then(&promise, None, None);
    cx.resolve(&promise, Value::Null);
    assert!(!promise.has_pending_reactions());
    assert_eq!(cx.pending_job_count(), 2);
}

#[test]
fn promise_values_compare_by_identity() {
    let cx = Context::new();
    let promise = cx.new_promise();
    let other = cx.new_promise();
    assert_eq!(promise.to_value(), promise.to_value());
    assert_eq!(promise.clone().to_value(), promise.to_value());
    assert_ne!(promise.to_value(), other.to_value());

    let held = promise.to_value();
    cx.resolve(&other, held.clone());
    cx.run_jobs();
    assert_eq!(other.state(), PromiseState::Pending);
    let derived = cx.then(&cx.promise_resolve(Value::Null), Some(Function::new(move |_| {
        Ok(Value::Array(vec![held.clone()]))
    })), None);
    cx.run_jobs();
    assert_eq!(derived.result(), Some(Value::Array(vec![promise.to_value()])));
}

#[test]
fn resolving_functions_outliving_context_do_nothing() {
    let cx = Context::new();
    let promise = cx.new_promise();
    let functions = cx.resolving_functions(&promise);
    drop(cx);
    assert_eq!(functions.resolve(Value::Smi(1)), SettleOutcome::AlreadyResolved);
    assert!(!functions.is_resolved());
    assert_eq!(promise.state(), PromiseState::Pending);
}
