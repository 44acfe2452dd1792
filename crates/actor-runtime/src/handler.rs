//! # Handler Trait
//!
//! The `Handler` trait is the contract every actor behaviour implements. The runtime
//! owns the actor's state and threads it through `handle` one message at a time:
//! the handler receives the current state and a message, and returns the new state plus
//! an optional reply. Because the state is passed by value and handed back, a failed
//! handler simply never returns a state, and the runtime cannot accidentally keep
//! running on a half-updated one.
//!
//! # Associated Types
//! As with any message-driven component, type safety comes from associated types:
//! an actor for `CounterMessage` cannot be sent a `LedgerMessage`, and the reply type
//! of `ask` is known at compile time.
//!
//! # Closures
//! Small actors don't need a dedicated type. [`handler_fn`] and [`try_handler_fn`]
//! adapt plain closures of shape `(state, message) -> (state, reply)`.
//!
//! # Context Injection
//! Collaborators (pools, buses, other actors' references) are declared as the
//! `Context` associated type and supplied when the actor starts running, not when it
//! is constructed. This late binding lets two actors reference each other.

use crate::error::SchedulerError;
use crate::reference::{ActorId, ActorRef, WeakActorRef};
use crate::scheduler::{Scheduler, TaskHandle};
use async_trait::async_trait;
use std::convert::Infallible;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Result of one handler invocation: the new state and an optional reply.
pub type Handled<H> = Result<
    (<H as Handler>::State, Option<<H as Handler>::Reply>),
    <H as Handler>::Error,
>;

/// Behaviour of an actor.
///
/// # Async & Context
/// This trait is `#[async_trait]` so handlers can await other actors, pooled
/// resources or bus publishes. Awaiting inside `handle` suspends only this actor's
/// task; other actors keep running on the worker pool.
#[async_trait]
pub trait Handler: Send + Sync + Sized + 'static {
    /// State owned exclusively by the actor's dispatch loop.
    type State: Send + 'static;

    /// Messages accepted by the actor's mailbox.
    type Message: Send + Debug + 'static;

    /// Reply type delivered to `ask` callers.
    type Reply: Send + 'static;

    /// Error that terminates the actor when returned from a hook.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Collaborators injected when the actor starts running.
    /// Use `()` if no dependencies are needed.
    type Context: Send + Sync + 'static;

    /// Process one message.
    async fn handle(
        &self,
        state: Self::State,
        message: Self::Message,
        ctx: &ActorContext<Self>,
    ) -> Handled<Self>;

    /// Called once before the first message is processed.
    async fn on_start(
        &self,
        state: Self::State,
        _ctx: &ActorContext<Self>,
    ) -> Result<Self::State, Self::Error> {
        Ok(state)
    }

    /// Called when the actor stops gracefully (stop request or all references dropped).
    /// Not called after a handler failure, since no valid state exists then.
    async fn on_stop(&self, _state: Self::State, _ctx: &ActorContext<Self>) {}
}

/// Per-actor view passed to every hook.
pub struct ActorContext<H: Handler> {
    id: ActorId,
    myself: WeakActorRef<H>,
    scheduler: Option<Scheduler>,
    deps: H::Context,
    timers: Mutex<Vec<TaskHandle>>,
}

impl<H: Handler> ActorContext<H> {
    pub(crate) fn new(
        id: ActorId,
        myself: WeakActorRef<H>,
        scheduler: Option<Scheduler>,
        deps: H::Context,
    ) -> Self {
        Self {
            id,
            myself,
            scheduler,
            deps,
            timers: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// A strong reference to this actor, if any other strong reference is still alive.
    pub fn myself(&self) -> Option<ActorRef<H>> {
        self.myself.upgrade()
    }

    /// The injected collaborators.
    pub fn deps(&self) -> &H::Context {
        &self.deps
    }

    pub fn scheduler(&self) -> Option<&Scheduler> {
        self.scheduler.as_ref()
    }

    /// Deliver `message` to this actor after `delay`.
    ///
    /// The timer holds only a weak reference, so a pending timer never keeps the actor
    /// alive. Timers still pending when the actor exits are cancelled.
    pub fn send_after(
        &self,
        delay: Duration,
        message: H::Message,
    ) -> Result<TaskHandle, SchedulerError> {
        let scheduler = self.scheduler.as_ref().ok_or(SchedulerError::Unavailable)?;
        let myself = self.myself.clone();
        let handle = scheduler.schedule_once(delay, move || async move {
            if let Some(actor) = myself.upgrade() {
                if let Err(e) = actor.send(message).await {
                    debug!(actor = %actor.id(), error = %e, "Timer delivery dropped");
                }
            }
        })?;
        self.track(handle.clone());
        Ok(handle)
    }

    /// Deliver a fresh message produced by `make` every `period`.
    pub fn send_every<F>(&self, period: Duration, make: F) -> Result<TaskHandle, SchedulerError>
    where
        F: Fn() -> H::Message + Send + Sync + 'static,
    {
        let scheduler = self.scheduler.as_ref().ok_or(SchedulerError::Unavailable)?;
        let myself = self.myself.clone();
        let handle = scheduler.schedule_every(period, move || {
            let myself = myself.clone();
            let message = make();
            async move {
                if let Some(actor) = myself.upgrade() {
                    if let Err(e) = actor.send(message).await {
                        debug!(actor = %actor.id(), error = %e, "Timer delivery dropped");
                    }
                }
            }
        })?;
        self.track(handle.clone());
        Ok(handle)
    }

    fn track(&self, handle: TaskHandle) {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.retain(TaskHandle::is_pending);
        timers.push(handle);
    }

    pub(crate) fn cancel_timers(&self) {
        let timers = std::mem::take(
            &mut *self.timers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for timer in timers {
            timer.cancel();
        }
    }
}

/// Adapter turning an infallible closure into a [`Handler`].
pub struct FnHandler<S, M, R, F> {
    f: F,
    _marker: PhantomData<fn(S, M) -> R>,
}

/// Build a handler from `(state, message) -> (state, Option<reply>)`.
///
/// ```rust
/// use actor_runtime::{handler_fn, Actor};
///
/// #[tokio::main]
/// async fn main() {
///     let echo = handler_fn(|count: u32, text: String| (count + 1, Some(text)));
///     let (actor, reference) = Actor::new(echo, 0, 8);
///     tokio::spawn(actor.run(()));
///
///     let reply = reference
///         .ask("hello".to_string(), std::time::Duration::from_secs(1))
///         .await
///         .unwrap();
///     assert_eq!(reply, "hello");
/// }
/// ```
pub fn handler_fn<S, M, R, F>(f: F) -> FnHandler<S, M, R, F>
where
    F: Fn(S, M) -> (S, Option<R>) + Send + Sync + 'static,
{
    FnHandler {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<S, M, R, F> Handler for FnHandler<S, M, R, F>
where
    S: Send + 'static,
    M: Send + Debug + 'static,
    R: Send + 'static,
    F: Fn(S, M) -> (S, Option<R>) + Send + Sync + 'static,
{
    type State = S;
    type Message = M;
    type Reply = R;
    type Error = Infallible;
    type Context = ();

    async fn handle(&self, state: S, message: M, _ctx: &ActorContext<Self>) -> Handled<Self> {
        Ok((self.f)(state, message))
    }
}

/// Adapter turning a fallible closure into a [`Handler`].
pub struct TryFnHandler<S, M, R, E, F> {
    f: F,
    _marker: PhantomData<fn(S, M) -> Result<R, E>>,
}

/// Build a handler from `(state, message) -> Result<(state, Option<reply>), E>`.
/// Returning `Err` terminates the actor.
pub fn try_handler_fn<S, M, R, E, F>(f: F) -> TryFnHandler<S, M, R, E, F>
where
    F: Fn(S, M) -> Result<(S, Option<R>), E> + Send + Sync + 'static,
{
    TryFnHandler {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<S, M, R, E, F> Handler for TryFnHandler<S, M, R, E, F>
where
    S: Send + 'static,
    M: Send + Debug + 'static,
    R: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(S, M) -> Result<(S, Option<R>), E> + Send + Sync + 'static,
{
    type State = S;
    type Message = M;
    type Reply = R;
    type Error = E;
    type Context = ();

    async fn handle(&self, state: S, message: M, _ctx: &ActorContext<Self>) -> Handled<Self> {
        (self.f)(state, message)
    }
}
