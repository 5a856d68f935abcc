//! Cross-thread dispatch to a context's event loop.
//!
//! Any thread may hand a [`Dispatchable`] to a [`Dispatcher`]; the embedding
//! gateway behind it must arrange for the dispatchable to run on the owning
//! context's thread. Once the dispatcher is shut down it refuses every
//! request, permanently.

use crate::context::Context;
use crate::error::{PromiseError, PromiseResult};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tells a running dispatchable whether the context is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaybeShuttingDown {
    /// Normal run: do the full work
    NotShuttingDown,
    /// The context is shutting down: abandon async continuations cheaply
    ShuttingDown,
}

/// Whether a dispatcher still accepts work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Requests are forwarded to the gateway
    Accepting,
    /// Requests are refused; this state is final
    ShuttingDown,
}

/// Work sent from any thread to run on a context's thread.
pub trait Dispatchable: Send {
    /// Called exactly once on the owning context's thread.
    fn run(self: Box<Self>, cx: &Context, maybe_shutting_down: MaybeShuttingDown);
}

struct DispatchFn<F>(F);

impl<F> Dispatchable for DispatchFn<F>
where
    F: FnOnce(&Context, MaybeShuttingDown) + Send,
{
    fn run(self: Box<Self>, cx: &Context, maybe_shutting_down: MaybeShuttingDown) {
        (self.0)(cx, maybe_shutting_down)
    }
}

/// Boxes a closure as a [`Dispatchable`].
pub fn dispatchable<F>(f: F) -> Box<dyn Dispatchable>
where
    F: FnOnce(&Context, MaybeShuttingDown) + Send + 'static,
{
    Box::new(DispatchFn(f))
}

/// Embedding-supplied gateway to an event loop.
///
/// Must be callable concurrently from any thread and must not wait for the
/// dispatchable to run. Returning `true` is a promise to run it eventually;
/// returning `false` means the loop no longer accepts work.
///
/// A gateway may query [`Dispatcher::state`] and may dispatch again from
/// inside `dispatch`, but must not call [`Dispatcher::shutdown`] there:
/// shutdown waits for every in-flight dispatch to return.
pub trait DispatchToEventLoop: Send + Sync {
    /// Schedules `dispatchable` on the owning context's thread.
    fn dispatch(&self, dispatchable: Box<dyn Dispatchable>) -> bool;
}

impl<F> DispatchToEventLoop for F
where
    F: Fn(Box<dyn Dispatchable>) -> bool + Send + Sync,
{
    fn dispatch(&self, dispatchable: Box<dyn Dispatchable>) -> bool {
        self(dispatchable)
    }
}

struct ChannelGateway {
    sender: Sender<Box<dyn Dispatchable>>,
}

impl DispatchToEventLoop for ChannelGateway {
    fn dispatch(&self, dispatchable: Box<dyn Dispatchable>) -> bool {
        self.sender.send(dispatchable).is_ok()
    }
}

struct DispatcherShared {
    shutting_down: AtomicBool,
    // Dispatches hold it shared across the gateway call; shutdown takes it
    // exclusively, so no accepted dispatchable lands after shutdown returns.
    gate: RwLock<()>,
    gateway: Box<dyn DispatchToEventLoop>,
}

/// Thread-safe handle for requesting dispatch onto one context.
///
/// # Examples
///
/// ```
/// use promise_engine::{dispatchable, Context, PromiseError};
///
/// let cx = Context::new();
/// let dispatcher = cx.dispatcher();
///
/// std::thread::spawn(move || {
///     dispatcher.request_dispatch(dispatchable(|_cx, _| {})).unwrap();
/// })
/// .join()
/// .unwrap();
/// assert_eq!(cx.run_dispatched(), 1);
///
/// cx.shutdown_async_tasks();
/// let refused = cx.dispatcher().request_dispatch(dispatchable(|_, _| {}));
/// assert_eq!(refused, Err(PromiseError::DispatchRejected));
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<DispatcherShared>,
}

impl Dispatcher {
    /// Wraps an embedding gateway.
    pub fn new<G>(gateway: G) -> Self
    where
        G: DispatchToEventLoop + 'static,
    {
        Self {
            shared: Arc::new(DispatcherShared {
                shutting_down: AtomicBool::new(false),
                gate: RwLock::new(()),
                gateway: Box::new(gateway),
            }),
        }
    }

    /// Built-in gateway backed by a channel drained on the context's thread.
    pub fn internal() -> (Self, DispatchReceiver) {
        let (sender, receiver) = channel::unbounded();
        (
            Self::new(ChannelGateway { sender }),
            DispatchReceiver { receiver },
        )
    }

    /// Forwards `dispatchable` to the gateway.
    ///
    /// Fails with [`PromiseError::DispatchRejected`] once shutdown has begun
    /// or if the gateway refuses; the dispatchable is then dropped unrun.
    ///
    /// Concurrent requests do not serialize on each other.
    pub fn request_dispatch(&self, dispatchable: Box<dyn Dispatchable>) -> PromiseResult<()> {
        let _gate = self.shared.gate.read_recursive();
        if self.shared.shutting_down.load(Ordering::Acquire) {
            tracing::warn!("dispatch refused: context is shutting down");
            return Err(PromiseError::DispatchRejected);
        }
        if self.shared.gateway.dispatch(dispatchable) {
            Ok(())
        } else {
            tracing::warn!("dispatch refused by gateway; dispatcher now shutting down");
            self.shared.shutting_down.store(true, Ordering::Release);
            Err(PromiseError::DispatchRejected)
        }
    }

    /// Moves to [`DispatchState::ShuttingDown`] once every in-flight
    /// dispatch has returned. Returns true on the call that performed the
    /// transition.
    pub fn shutdown(&self) -> bool {
        let _gate = self.shared.gate.write();
        !self.shared.shutting_down.swap(true, Ordering::AcqRel)
    }

    /// Current dispatch state.
    pub fn state(&self) -> DispatchState {
        if self.shared.shutting_down.load(Ordering::Acquire) {
            DispatchState::ShuttingDown
        } else {
            DispatchState::Accepting
        }
    }

    /// The flag to pass to a dispatchable that is about to run.
    pub fn maybe_shutting_down(&self) -> MaybeShuttingDown {
        match self.state() {
            DispatchState::Accepting => MaybeShuttingDown::NotShuttingDown,
            DispatchState::ShuttingDown => MaybeShuttingDown::ShuttingDown,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Receiving end of the built-in gateway, owned by the context.
pub struct DispatchReceiver {
    receiver: Receiver<Box<dyn Dispatchable>>,
}

impl DispatchReceiver {
    /// Next dispatchable, if one is waiting.
    pub fn try_next(&self) -> Option<Box<dyn Dispatchable>> {
        self.receiver.try_recv().ok()
    }

    /// Blocks the embedding's loop until a dispatchable arrives or `timeout`
    /// passes.
    pub fn next_timeout(&self, timeout: Duration) -> Option<Box<dyn Dispatchable>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(dispatchable) => Some(dispatchable),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of dispatchables waiting.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl std::fmt::Debug for DispatchReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchReceiver")
            .field("pending", &self.len())
            .finish()
    }
}
