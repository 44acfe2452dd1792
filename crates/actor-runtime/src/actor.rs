//! # Actor Dispatch Loop
//!
//! This module defines [`Actor`], the "server" half of every actor. It owns the
//! handler, the state and the receiving end of the mailbox, and processes mail
//! strictly one message at a time.

use crate::handler::{ActorContext, Handler};
use crate::message::{Envelope, Mail};
use crate::reference::{ActorId, ActorRef};
use crate::scheduler::Scheduler;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Why an actor's dispatch loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorExit {
    /// A stop request was processed.
    Stopped,
    /// Every strong reference was dropped and the mailbox drained.
    Dropped,
    /// `on_start` returned an error; no message was processed.
    StartFailed(String),
    /// A handler returned an error.
    Failed(String),
    /// A handler panicked.
    Panicked(String),
}

impl ActorExit {
    /// Whether the actor ended without a handler failure.
    pub fn is_graceful(&self) -> bool {
        matches!(self, ActorExit::Stopped | ActorExit::Dropped)
    }
}

impl fmt::Display for ActorExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorExit::Stopped => f.write_str("stopped"),
            ActorExit::Dropped => f.write_str("all references dropped"),
            ActorExit::StartFailed(e) => write!(f, "start failed: {e}"),
            ActorExit::Failed(e) => write!(f, "handler failed: {e}"),
            ActorExit::Panicked(e) => write!(f, "handler panicked: {e}"),
        }
    }
}

/// An actor that has been created but whose loop is not yet running.
///
/// # Architecture Note
/// `Actor` owns the state and the receiver end of the channel. Even when thousands of
/// actors run concurrently, each one processes its own mailbox *sequentially*, so the
/// state needs no `Mutex` or `RwLock`: exclusive ownership inside the task is the
/// synchronisation.
///
/// # Usage Pattern
///
/// 1.  **Create**: Call `Actor::new()` to get the `actor` (server) and a reference.
/// 2.  **Wire**: Pass dependencies into `actor.run(context)`.
/// 3.  **Run**: Spawn the returned future on the Tokio runtime.
///
/// ```rust
/// use actor_runtime::{handler_fn, Actor};
///
/// #[tokio::main]
/// async fn main() {
///     let counter = handler_fn(|total: u64, n: u64| (total + n, Some(total + n)));
///     let (actor, reference) = Actor::new(counter, 0, 16);
///     tokio::spawn(actor.run(()));
///
///     reference.send(5).await.unwrap();
///     let total = reference.ask(2, std::time::Duration::from_secs(1)).await.unwrap();
///     assert_eq!(total, 7);
/// }
/// ```
///
/// `ActorSystem::spawn` does all three steps in one call and attaches the scheduler.
pub struct Actor<H: Handler> {
    id: ActorId,
    handler: H,
    state: H::State,
    receiver: mpsc::Receiver<Mail<H>>,
    myself: ActorRef<H>,
    scheduler: Option<Scheduler>,
}

impl<H: Handler> Actor<H> {
    /// Creates a new `Actor` and its first [`ActorRef`].
    ///
    /// # Arguments
    ///
    /// * `handler` - The behaviour invoked for each message.
    /// * `state` - The initial state, owned by the loop from now on.
    /// * `mailbox_capacity` - The capacity of the MPSC channel. When the mailbox is full,
    ///   `send` waits and `try_send` fails.
    pub fn new(handler: H, state: H::State, mailbox_capacity: usize) -> (Self, ActorRef<H>) {
        let (sender, receiver) = mpsc::channel(mailbox_capacity.max(1));
        let id = ActorId::next();
        let reference = ActorRef::new(id, sender);
        let actor = Self {
            id,
            handler,
            state,
            receiver,
            myself: reference.clone(),
            scheduler: None,
        };
        (actor, reference)
    }

    /// Attach a scheduler so handlers can use [`ActorContext::send_after`].
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Runs the dispatch loop until the actor stops, fails, or every reference is gone.
    ///
    /// # Context Injection
    /// `deps` is handed to every hook through [`ActorContext::deps`]. Because it is
    /// supplied here rather than in `new`, actors can be created first and wired to
    /// each other afterwards.
    pub async fn run(self, deps: H::Context) -> ActorExit {
        let Actor {
            id,
            handler,
            state,
            mut receiver,
            myself,
            scheduler,
        } = self;
        // Only the weak form is kept so the loop never holds its own mailbox open.
        let ctx = ActorContext::new(id, myself.downgrade(), scheduler, deps);
        drop(myself);

        let handler_type = std::any::type_name::<H>()
            .split('<')
            .next()
            .and_then(|path| path.rsplit("::").next())
            .unwrap_or("Unknown");
        info!(actor = %id, handler = handler_type, "Actor started");

        let mut state = match AssertUnwindSafe(handler.on_start(state, &ctx))
            .catch_unwind()
            .await
        {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                error!(actor = %id, handler = handler_type, error = %e, "on_start failed");
                ctx.cancel_timers();
                return ActorExit::StartFailed(e.to_string());
            }
            Err(panic) => {
                let reason = panic_message(panic);
                error!(actor = %id, handler = handler_type, reason = %reason, "on_start panicked");
                ctx.cancel_timers();
                return ActorExit::Panicked(reason);
            }
        };

        let mut processed: u64 = 0;
        let exit = loop {
            let Some(mail) = receiver.recv().await else {
                break ActorExit::Dropped;
            };
            let Envelope { payload, reply_to } = match mail {
                Mail::Stop => break ActorExit::Stopped,
                Mail::Deliver(envelope) => envelope,
            };
            debug!(actor = %id, ?payload, expects_reply = reply_to.is_some(), "Deliver");

            let outcome = AssertUnwindSafe(handler.handle(state, payload, &ctx))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok((next, reply))) => {
                    state = next;
                    processed += 1;
                    if let (Some(reply_to), Some(reply)) = (reply_to, reply) {
                        if reply_to.send(reply).is_err() {
                            debug!(actor = %id, "Requester gone, reply discarded");
                        }
                    }
                }
                Ok(Err(e)) => {
                    error!(
                        actor = %id,
                        handler = handler_type,
                        processed,
                        error = %e,
                        "Handler failed"
                    );
                    ctx.cancel_timers();
                    return ActorExit::Failed(e.to_string());
                }
                Err(panic) => {
                    let reason = panic_message(panic);
                    error!(
                        actor = %id,
                        handler = handler_type,
                        processed,
                        reason = %reason,
                        "Handler panicked"
                    );
                    ctx.cancel_timers();
                    return ActorExit::Panicked(reason);
                }
            }
        };

        // Anything queued behind a stop request is discarded; pending askers see
        // their reply channel close.
        receiver.close();
        ctx.cancel_timers();
        handler.on_stop(state, &ctx).await;
        info!(actor = %id, handler = handler_type, processed, reason = %exit, "Shutdown");
        exit
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActorError;
    use crate::handler::{handler_fn, try_handler_fn};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("rejected {0}")]
    struct Rejected(u32);

    #[tokio::test]
    async fn test_loop_exits_when_references_dropped() {
        let (actor, reference) = Actor::new(handler_fn(|n: u32, m: u32| (n + m, None::<()>)), 0, 4);
        let task = tokio::spawn(actor.run(()));

        reference.send(1).await.unwrap();
        drop(reference);

        assert_eq!(task.await.unwrap(), ActorExit::Dropped);
    }

    #[tokio::test]
    async fn test_handler_error_terminates_actor() {
        let handler = try_handler_fn(|n: u32, m: u32| {
            if m == 13 {
                Err(Rejected(m))
            } else {
                Ok((n + m, Some(n + m)))
            }
        });
        let (actor, reference) = Actor::new(handler, 0, 4);
        let task = tokio::spawn(actor.run(()));

        assert_eq!(reference.ask(2, Duration::from_secs(1)).await, Ok(2));
        assert_eq!(
            reference.ask(13, Duration::from_secs(1)).await,
            Err(ActorError::AskChannelClosed)
        );

        let exit = task.await.unwrap();
        assert_eq!(exit, ActorExit::Failed("rejected 13".to_string()));
        assert!(!reference.is_alive());
        assert_eq!(reference.send(1).await, Err(ActorError::MailboxClosed));
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let handler = handler_fn(|n: u32, m: u32| {
            if m == 0 {
                panic!("division by zero");
            }
            (n / m, Some(n / m))
        });
        let (actor, reference) = Actor::new(handler, 100, 4);
        let task = tokio::spawn(actor.run(()));

        reference.send(0).await.unwrap();

        let exit = task.await.unwrap();
        assert_eq!(exit, ActorExit::Panicked("division by zero".to_string()));
        reference.closed().await;
        assert!(!reference.is_alive());
    }

    #[tokio::test]
    async fn test_stop_discards_later_mail() {
        let (actor, reference) =
            Actor::new(handler_fn(|n: u32, m: u32| (n + m, Some(n + m))), 0, 8);

        // Queue everything before the loop starts so ordering is deterministic.
        reference.send(1).await.unwrap();
        reference.stop().await.unwrap();
        let late = reference.clone();
        let ask = tokio::spawn(async move { late.ask(5, Duration::from_secs(1)).await });
        tokio::task::yield_now().await;

        let exit = actor.run(()).await;
        assert_eq!(exit, ActorExit::Stopped);
        assert_eq!(ask.await.unwrap(), Err(ActorError::AskChannelClosed));
    }
}
