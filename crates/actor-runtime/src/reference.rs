//! # Actor References
//!
//! This module defines the handles used to talk to actors.

use crate::error::ActorError;
use crate::handler::Handler;
use crate::message::{Envelope, Mail};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique actor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// ## ActorRef
///
/// The `ActorRef<H>` is a type‑safe, async handle to an actor running handler `H`. It
/// forwards messages over a bounded Tokio mpsc channel and receives replies via oneshot
/// channels. The reference is cheap to clone and can be shared across tasks.
///
/// * **Cloneable** – holds only a sender, so cloning is inexpensive.
/// * **Lifetime** – the actor runs until it is stopped, fails, or the last `ActorRef`
///   is dropped.
/// * **Two send modes** – [`send`](Self::send) waits for mailbox space,
///   [`try_send`](Self::try_send) fails immediately when the mailbox is full.
pub struct ActorRef<H: Handler> {
    id: ActorId,
    sender: mpsc::Sender<Mail<H>>,
}

impl<H: Handler> Clone for ActorRef<H> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sender: self.sender.clone(),
        }
    }
}

impl<H: Handler> fmt::Debug for ActorRef<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef").field("id", &self.id).finish()
    }
}

impl<H: Handler> ActorRef<H> {
    pub(crate) fn new(id: ActorId, sender: mpsc::Sender<Mail<H>>) -> Self {
        Self { id, sender }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Fire-and-forget delivery with backpressure.
    ///
    /// Returns once the envelope is enqueued. If the mailbox is full, this waits for
    /// space without blocking the worker thread.
    pub async fn send(&self, message: H::Message) -> Result<(), ActorError> {
        self.sender
            .send(Mail::Deliver(Envelope::tell(message)))
            .await
            .map_err(|_| ActorError::MailboxClosed)
    }

    /// Fire-and-forget delivery that never waits.
    ///
    /// Fails with [`ActorError::MailboxFull`] instead of applying backpressure.
    pub fn try_send(&self, message: H::Message) -> Result<(), ActorError> {
        self.sender
            .try_send(Mail::Deliver(Envelope::tell(message)))
            .map_err(|e| match e {
                TrySendError::Full(_) => ActorError::MailboxFull {
                    capacity: self.sender.max_capacity(),
                },
                TrySendError::Closed(_) => ActorError::MailboxClosed,
            })
    }

    /// Request/response delivery.
    ///
    /// `timeout` bounds the whole exchange, including waiting for mailbox space. When
    /// it elapses the caller's wait is abandoned; the message stays queued and the
    /// handler still runs, its reply is simply discarded.
    ///
    /// A handler that answers without a reply leaves the caller waiting for the full
    /// `timeout`. Only the actor terminating ends the wait early, with
    /// [`ActorError::AskChannelClosed`].
    pub async fn ask(
        &self,
        message: H::Message,
        timeout: Duration,
    ) -> Result<H::Reply, ActorError> {
        let (reply_to, response) = oneshot::channel();
        let exchange = async {
            self.sender
                .send(Mail::Deliver(Envelope::ask(message, reply_to)))
                .await
                .map_err(|_| ActorError::AskChannelClosed)?;
            match response.await {
                Ok(reply) => Ok(reply),
                Err(_) => {
                    self.sender.closed().await;
                    Err(ActorError::AskChannelClosed)
                }
            }
        };
        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ActorError::AskTimedOut(timeout))?
    }

    /// Ask the actor to stop once it has processed everything already queued.
    pub async fn stop(&self) -> Result<(), ActorError> {
        self.sender
            .send(Mail::Stop)
            .await
            .map_err(|_| ActorError::MailboxClosed)
    }

    /// Whether the actor's dispatch loop is still accepting mail.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Resolves once the actor's dispatch loop has exited.
    pub async fn closed(&self) {
        self.sender.closed().await
    }

    /// A reference that does not keep the actor alive.
    pub fn downgrade(&self) -> WeakActorRef<H> {
        WeakActorRef {
            id: self.id,
            sender: self.sender.downgrade(),
        }
    }
}

/// Non-owning counterpart of [`ActorRef`].
pub struct WeakActorRef<H: Handler> {
    id: ActorId,
    sender: mpsc::WeakSender<Mail<H>>,
}

impl<H: Handler> Clone for WeakActorRef<H> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sender: self.sender.clone(),
        }
    }
}

impl<H: Handler> WeakActorRef<H> {
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Upgrade to a strong reference if the actor still has other strong references.
    pub fn upgrade(&self) -> Option<ActorRef<H>> {
        self.sender.upgrade().map(|sender| ActorRef::new(self.id, sender))
    }
}
