//! Promise state machine.
//!
//! A [`Promise`] is a shared handle to a single eventual outcome. It starts
//! Pending and leaves that state at most once; its result is immutable from
//! then on. Settlement goes through [`ResolvingFunctions`], which carry the
//! "already resolved" flag shared by every resolve/reject path of a promise.

use crate::context::{Context, WeakContext};
use crate::error::{PromiseError, PromiseResult};
use crate::scheduler;
use core_types::{Completion, SavedStack, Value};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// The state of a Promise.
///
/// Once settled (Fulfilled or Rejected), a Promise cannot change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been resolved with a value.
    Fulfilled,
    /// The promise has been rejected with a reason.
    Rejected,
}

/// Whether the promise chain started while a user activation was processed.
///
/// Promises start as `DontCare`; an embedding that sets another state on a
/// promise sees it copied onto every promise derived through chaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserInputState {
    /// Not tracked
    #[default]
    DontCare,
    /// The chain originated during user interaction
    HadUserInteractionAtCreation,
    /// The chain originated outside user interaction
    DidntHaveUserInteractionAtCreation,
}

/// What a resolve or reject call did.
///
/// Settling a promise twice is not an error; the second call reports
/// `AlreadyResolved` and changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The promise is now fulfilled
    Fulfilled,
    /// The promise is now rejected
    Rejected,
    /// The promise is locked in to a promise or thenable and will follow it
    Adopting,
    /// The promise was already resolved; nothing changed
    AlreadyResolved,
}

/// A reaction handler.
///
/// Handlers receive the settlement value as their only argument. Returning
/// `Err` means the handler threw.
#[derive(Clone)]
pub struct Function {
    callback: Rc<dyn Fn(Vec<Value>) -> Completion>,
}

impl Function {
    /// Creates a new Function from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Completion + 'static,
    {
        Self {
            callback: Rc::new(f),
        }
    }

    /// Calls the function with the given arguments.
    pub fn call(&self, args: Vec<Value>) -> Completion {
        (self.callback)(args)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Function {{ ... }}")
    }
}

/// First argument of a handler call, `undefined` if absent.
pub(crate) fn first_arg(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or(Value::Undefined)
}

/// A reaction to be triggered when a Promise settles.
#[derive(Debug)]
pub struct PromiseReaction {
    /// Promise settled with the handler's outcome; absent for reactions
    /// registered through the unforgeable variant
    pub(crate) derived: Option<Promise>,
    pub(crate) on_fulfilled: Option<Function>,
    pub(crate) on_rejected: Option<Function>,
    pub(crate) incumbent_global: Option<Value>,
}

impl PromiseReaction {
    /// The promise this reaction settles, if any.
    pub fn derived_promise(&self) -> Option<&Promise> {
        self.derived.as_ref()
    }
}

#[derive(Debug)]
struct PromiseInner {
    id: u64,
    state: PromiseState,
    result: Option<Value>,
    is_handled: bool,
    user_input: UserInputState,
    reactions: Vec<PromiseReaction>,
    already_resolved: Rc<Cell<bool>>,
    allocation_site: Option<SavedStack>,
    resolution_site: Option<SavedStack>,
    // Live value wrapper, so every `to_value` yields the same object.
    wrapper: Option<Weak<RefCell<dyn Any>>>,
}

/// Handle to a promise owned by one execution context.
///
/// Cloning the handle does not clone the promise; clones compare equal.
///
/// # Examples
///
/// ```
/// use promise_engine::{Context, PromiseState};
/// use core_types::Value;
///
/// let cx = Context::new();
/// let promise = cx.new_promise();
/// assert_eq!(promise.state(), PromiseState::Pending);
///
/// cx.resolve(&promise, Value::Smi(42));
/// assert_eq!(promise.state(), PromiseState::Fulfilled);
/// assert_eq!(promise.result(), Some(Value::Smi(42)));
/// ```
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<PromiseInner>>,
}

impl Promise {
    pub(crate) fn new_pending(allocation_site: Option<SavedStack>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PromiseInner {
                id: NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed),
                state: PromiseState::Pending,
                result: None,
                is_handled: false,
                user_input: UserInputState::DontCare,
                reactions: Vec::new(),
                already_resolved: Rc::new(Cell::new(false)),
                allocation_site,
                resolution_site: None,
                wrapper: None,
            })),
        }
    }

    /// Process-unique identifier, stable for the promise's lifetime.
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    /// Current state.
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state
    }

    /// Resolution value or rejection reason; `None` while pending.
    pub fn result(&self) -> Option<Value> {
        self.inner.borrow().result.clone()
    }

    /// Whether a rejection-observing reaction has been attached.
    ///
    /// Only meaningful once the promise is rejected.
    pub fn is_handled(&self) -> bool {
        self.inner.borrow().is_handled
    }

    /// User-input state of this promise.
    pub fn user_input_state(&self) -> UserInputState {
        self.inner.borrow().user_input
    }

    /// Sets the user-input state; later derived promises inherit it.
    pub fn set_user_input_state(&self, state: UserInputState) {
        self.inner.borrow_mut().user_input = state;
    }

    /// Stack captured when the promise was created.
    pub fn allocation_site(&self) -> Option<SavedStack> {
        self.inner.borrow().allocation_site.clone()
    }

    /// Stack captured when the promise settled.
    pub fn resolution_site(&self) -> Option<SavedStack> {
        self.inner.borrow().resolution_site.clone()
    }

    /// Checks if there are pending reactions.
    pub fn has_pending_reactions(&self) -> bool {
        !self.inner.borrow().reactions.is_empty()
    }

    /// Number of reactions waiting for settlement.
    pub fn reaction_count(&self) -> usize {
        self.inner.borrow().reactions.len()
    }

    /// Wraps the handle as an opaque value.
    ///
    /// While any wrapper is alive, every call returns that same object, so
    /// values holding one promise compare equal.
    pub fn to_value(&self) -> Value {
        if let Some(wrapper) = self.inner.borrow().wrapper.as_ref().and_then(Weak::upgrade) {
            return Value::NativeObject(wrapper);
        }
        let wrapper: Rc<RefCell<dyn Any>> = Rc::new(RefCell::new(self.clone()));
        self.inner.borrow_mut().wrapper = Some(Rc::downgrade(&wrapper));
        Value::NativeObject(wrapper)
    }

    /// Recovers the promise handle from a value, if it holds one.
    pub fn from_value(value: &Value) -> Option<Promise> {
        value.downcast_native::<Promise>()
    }

    /// Returns true if both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakPromise {
        WeakPromise {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn resolved_flag(&self) -> Rc<Cell<bool>> {
        self.inner.borrow().already_resolved.clone()
    }

    /// Moves out of Pending. Returns the reactions to trigger, or `None`
    /// if the promise had already settled.
    pub(crate) fn settle(
        &self,
        state: PromiseState,
        value: Value,
        resolution_site: Option<SavedStack>,
    ) -> Option<Vec<PromiseReaction>> {
        let mut inner = self.inner.borrow_mut();
        if inner.state != PromiseState::Pending {
            return None;
        }
        inner.state = state;
        inner.result = Some(value);
        inner.resolution_site = resolution_site;
        Some(std::mem::take(&mut inner.reactions))
    }

    pub(crate) fn push_reaction(&self, reaction: PromiseReaction) {
        self.inner.borrow_mut().reactions.push(reaction);
    }

    pub(crate) fn mark_handled(&self) {
        self.inner.borrow_mut().is_handled = true;
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Promise")
                .field("id", &inner.id)
                .field("state", &inner.state)
                .field("result", &inner.result)
                .field("reactions", &inner.reactions.len())
                .finish(),
            Err(_) => write!(f, "Promise {{ <borrowed> }}"),
        }
    }
}

/// Handle that does not keep its promise alive.
#[derive(Debug, Clone)]
pub(crate) struct WeakPromise {
    inner: Weak<RefCell<PromiseInner>>,
}

impl WeakPromise {
    pub(crate) fn upgrade(&self) -> Option<Promise> {
        self.inner.upgrade().map(|inner| Promise { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

/// The resolve/reject pair bound to one promise.
///
/// All clones share one "already resolved" flag: the first call wins and
/// every later call returns [`SettleOutcome::AlreadyResolved`].
///
/// The functions do not keep their context alive. Once it is dropped they
/// change nothing and report `AlreadyResolved`.
#[derive(Clone)]
pub struct ResolvingFunctions {
    promise: Promise,
    already_resolved: Rc<Cell<bool>>,
    cx: WeakContext,
}

impl ResolvingFunctions {
    /// The pair stored on the promise itself, shared with its executor.
    pub(crate) fn primary(cx: &Context, promise: &Promise) -> Self {
        Self {
            promise: promise.clone(),
            already_resolved: promise.resolved_flag(),
            cx: cx.downgrade(),
        }
    }

    /// A new pair with its own flag, used when adopting a thenable.
    pub(crate) fn fresh(cx: &Context, promise: &Promise) -> Self {
        Self {
            promise: promise.clone(),
            already_resolved: Rc::new(Cell::new(false)),
            cx: cx.downgrade(),
        }
    }

    /// The promise these functions settle.
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Whether resolve or reject has already been called.
    pub fn is_resolved(&self) -> bool {
        self.already_resolved.get()
    }

    /// Resolves the promise, adopting `value` if it is a promise or thenable.
    pub fn resolve(&self, value: Value) -> SettleOutcome {
        let Some(cx) = self.claim() else {
            return SettleOutcome::AlreadyResolved;
        };
        scheduler::resolve(&cx, &self.promise, value)
    }

    /// Rejects the promise with `reason`.
    pub fn reject(&self, reason: Value) -> SettleOutcome {
        let Some(cx) = self.claim() else {
            return SettleOutcome::AlreadyResolved;
        };
        scheduler::reject(&cx, &self.promise, reason)
    }

    /// Sets the "already resolved" flag, returning the context if this call
    /// won it.
    fn claim(&self) -> Option<Context> {
        let Some(cx) = self.cx.upgrade() else {
            tracing::debug!(promise = self.promise.id(), "context dropped; settlement ignored");
            return None;
        };
        (!self.already_resolved.replace(true)).then_some(cx)
    }
}

impl std::fmt::Debug for ResolvingFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvingFunctions")
            .field("promise", &self.promise.id())
            .field("already_resolved", &self.already_resolved.get())
            .finish()
    }
}

/// A promise-like object: anything with a `then` operation.
///
/// Resolving a promise with a thenable makes the promise follow whatever
/// the thenable reports through the resolving functions it is handed.
#[derive(Clone)]
pub struct Thenable {
    then: Rc<dyn Fn(ResolvingFunctions) -> Result<(), Value>>,
}

impl Thenable {
    /// Creates a thenable from its `then` operation.
    pub fn new<F>(then: F) -> Self
    where
        F: Fn(ResolvingFunctions) -> Result<(), Value> + 'static,
    {
        Self { then: Rc::new(then) }
    }

    /// Wraps the thenable as an opaque value.
    pub fn to_value(&self) -> Value {
        Value::native(self.clone())
    }

    pub(crate) fn call_then(&self, functions: ResolvingFunctions) -> Result<(), Value> {
        (self.then)(functions)
    }
}

impl std::fmt::Debug for Thenable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Thenable {{ ... }}")
    }
}

/// Returns true if `value` holds a promise.
pub fn is_promise_object(value: &Value) -> bool {
    value.is_native::<Promise>()
}

/// Extracts a promise, failing with a type error otherwise.
pub fn as_promise(value: &Value) -> PromiseResult<Promise> {
    Promise::from_value(value).ok_or_else(|| PromiseError::not_a_promise(value))
}

/// State of the promise held by `value`.
///
/// Values that cannot be introspected report `Pending`.
pub fn promise_state(value: &Value) -> PromiseState {
    Promise::from_value(value)
        .map(|p| p.state())
        .unwrap_or(PromiseState::Pending)
}

/// Process-unique id of the promise held by `value`.
pub fn promise_id(value: &Value) -> PromiseResult<u64> {
    Ok(as_promise(value)?.id())
}

/// Resolution value or rejection reason; `undefined` while pending.
pub fn promise_result(value: &Value) -> PromiseResult<Value> {
    Ok(as_promise(value)?.result().unwrap_or(Value::Undefined))
}

/// Whether the rejected promise held by `value` has a rejection handler.
pub fn promise_is_handled(value: &Value) -> PromiseResult<bool> {
    Ok(as_promise(value)?.is_handled())
}

/// User-input state of the promise held by `value`; `DontCare` otherwise.
pub fn promise_user_input_state(value: &Value) -> UserInputState {
    Promise::from_value(value)
        .map(|p| p.user_input_state())
        .unwrap_or_default()
}

/// Sets the user-input state of the promise held by `value`.
pub fn set_promise_user_input_state(value: &Value, state: UserInputState) -> PromiseResult<()> {
    as_promise(value)?.set_user_input_state(state);
    Ok(())
}
