//! Reaction scheduling.
//!
//! Settlement turns a promise's reactions into jobs on the context's queue.
//! Reactions attached to an already-settled promise normally become jobs as
//! well; with [`ReactionScheduling::FastPath`](crate::ReactionScheduling)
//! they run in place instead, but only when the queue is verified empty.

use crate::context::Context;
use crate::job_queue::{Job, JobKind};
use crate::promise::{
    first_arg, Function, Promise, PromiseReaction, PromiseState, ResolvingFunctions,
    SettleOutcome, Thenable,
};
use crate::rejection::PromiseRejectionHandlingState;
use core_types::{JsError, Value};

/// Something a promise can lock in to.
enum Adoptee {
    Promise(Promise),
    Thenable(Thenable),
}

/// Resolve step of a resolving function; the caller has already claimed
/// the "already resolved" flag.
pub(crate) fn resolve(cx: &Context, promise: &Promise, value: Value) -> SettleOutcome {
    let adoptee = if let Some(target) = Promise::from_value(&value) {
        if target.ptr_eq(promise) {
            let error = JsError::type_error("A promise cannot be resolved with itself");
            return reject(cx, promise, error.into());
        }
        Adoptee::Promise(target)
    } else if let Some(thenable) = value.downcast_native::<Thenable>() {
        Adoptee::Thenable(thenable)
    } else {
        return fulfill(cx, promise, value);
    };
    enqueue_resolve_thenable_job(cx, promise, adoptee);
    SettleOutcome::Adopting
}

fn fulfill(cx: &Context, promise: &Promise, value: Value) -> SettleOutcome {
    let Some(reactions) = promise.settle(PromiseState::Fulfilled, value.clone(), cx.capture_stack())
    else {
        return SettleOutcome::AlreadyResolved;
    };
    tracing::debug!(promise = promise.id(), reactions = reactions.len(), "promise fulfilled");
    trigger_reactions(cx, promise, reactions, PromiseState::Fulfilled, value);
    SettleOutcome::Fulfilled
}

pub(crate) fn reject(cx: &Context, promise: &Promise, reason: Value) -> SettleOutcome {
    let Some(reactions) = promise.settle(PromiseState::Rejected, reason.clone(), cx.capture_stack())
    else {
        return SettleOutcome::AlreadyResolved;
    };
    tracing::debug!(promise = promise.id(), reactions = reactions.len(), "promise rejected");
    if !promise.is_handled() {
        cx.track_rejection(promise, PromiseRejectionHandlingState::Unhandled);
    }
    trigger_reactions(cx, promise, reactions, PromiseState::Rejected, reason);
    SettleOutcome::Rejected
}

fn trigger_reactions(
    cx: &Context,
    promise: &Promise,
    reactions: Vec<PromiseReaction>,
    state: PromiseState,
    argument: Value,
) {
    // Never fast-pathed: a reaction run in place could enqueue work ahead
    // of its siblings.
    for reaction in reactions {
        cx.enqueue_job(reaction_job(promise, reaction, state, argument.clone()));
    }
}

/// Registers a reaction on `promise`.
///
/// With a derived promise the reaction always observes rejections, since an
/// unhandled rejection is forwarded to the derived promise. Without one it
/// observes them only when `on_rejected` is supplied.
pub(crate) fn perform_then(
    cx: &Context,
    promise: &Promise,
    on_fulfilled: Option<Function>,
    on_rejected: Option<Function>,
    derived: Option<Promise>,
) {
    let observes_rejection = derived.is_some() || on_rejected.is_some();
    let reaction = PromiseReaction {
        derived,
        on_fulfilled,
        on_rejected,
        incumbent_global: cx.incumbent_global(),
    };

    let state = promise.state();
    if state == PromiseState::Pending {
        promise.push_reaction(reaction);
        if observes_rejection {
            promise.mark_handled();
        }
        return;
    }

    if state == PromiseState::Rejected && observes_rejection && !promise.is_handled() {
        cx.track_rejection(promise, PromiseRejectionHandlingState::Handled);
    }
    if observes_rejection {
        promise.mark_handled();
    }

    let argument = promise.result().unwrap_or(Value::Undefined);
    let job = reaction_job(promise, reaction, state, argument);
    if cx.fast_path_available() {
        tracing::trace!(promise = promise.id(), "running reaction in place");
        job.run(cx);
    } else {
        cx.enqueue_job(job);
    }
}

fn reaction_job(promise: &Promise, reaction: PromiseReaction, state: PromiseState, argument: Value) -> Job {
    let incumbent_global = reaction.incumbent_global.clone();
    Job::for_promise(JobKind::PromiseReaction, promise, incumbent_global, move |cx| {
        let PromiseReaction {
            derived,
            on_fulfilled,
            on_rejected,
            ..
        } = reaction;
        let rejected = state == PromiseState::Rejected;
        let handler = if rejected { on_rejected } else { on_fulfilled };
        let had_handler = handler.is_some();
        let completion = match handler {
            Some(handler) => handler.call(vec![argument]),
            None if rejected => Err(argument),
            None => Ok(argument),
        };

        match (derived, completion) {
            (Some(derived), Ok(value)) => {
                ResolvingFunctions::primary(cx, &derived).resolve(value);
            }
            (Some(derived), Err(reason)) => {
                ResolvingFunctions::primary(cx, &derived).reject(reason);
            }
            (None, Err(reason)) if had_handler => {
                tracing::debug!(%reason, "reaction handler threw with no derived promise");
            }
            (None, _) => {}
        }
    })
}

fn enqueue_resolve_thenable_job(cx: &Context, promise: &Promise, adoptee: Adoptee) {
    let target = promise.clone();
    let job = Job::for_promise(
        JobKind::PromiseResolveThenable,
        promise,
        cx.incumbent_global(),
        move |cx| {
            let functions = ResolvingFunctions::fresh(cx, &target);
            match adoptee {
                Adoptee::Promise(source) => {
                    let (on_resolve, on_reject) = (functions.clone(), functions);
                    let on_fulfilled = Function::new(move |args| {
                        on_resolve.resolve(first_arg(args));
                        Ok(Value::Undefined)
                    });
                    let on_rejected = Function::new(move |args| {
                        on_reject.reject(first_arg(args));
                        Ok(Value::Undefined)
                    });
                    perform_then(cx, &source, Some(on_fulfilled), Some(on_rejected), None);
                }
                Adoptee::Thenable(thenable) => {
                    if let Err(thrown) = thenable.call_then(functions.clone()) {
                        // Ignored if the thenable already resolved us.
                        functions.reject(thrown);
                    }
                }
            }
        },
    );
    cx.enqueue_job(job);
}
