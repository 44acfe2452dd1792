//! # Mailbox Messages
//!
//! This module defines what travels through an actor's mailbox. Every payload is
//! wrapped in an [`Envelope`] that optionally carries a one-shot reply channel, and the
//! envelope is wrapped once more in [`Mail`] so the runtime can slip control requests
//! (such as a graceful stop) into the same FIFO stream as ordinary messages.

use crate::handler::Handler;
use std::fmt;
use tokio::sync::oneshot;

/// Type alias for the one-shot reply channel attached to an `ask`.
pub type ReplyTo<R> = oneshot::Sender<R>;

/// A payload plus an optional reply channel.
///
/// Created at send time and consumed exactly once by the actor's dispatch loop.
pub struct Envelope<M, R> {
    pub payload: M,
    pub reply_to: Option<ReplyTo<R>>,
}

impl<M, R> Envelope<M, R> {
    /// Envelope for fire-and-forget delivery.
    pub fn tell(payload: M) -> Self {
        Self {
            payload,
            reply_to: None,
        }
    }

    /// Envelope for request/response delivery.
    pub fn ask(payload: M, reply_to: ReplyTo<R>) -> Self {
        Self {
            payload,
            reply_to: Some(reply_to),
        }
    }

    pub fn expects_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

impl<M: fmt::Debug, R> fmt::Debug for Envelope<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("payload", &self.payload)
            .field("expects_reply", &self.expects_reply())
            .finish()
    }
}

/// An item in an actor's mailbox.
///
/// `Stop` is ordered like any other mail: everything enqueued before it is processed,
/// everything enqueued after it is discarded.
pub enum Mail<H: Handler> {
    Deliver(Envelope<H::Message, H::Reply>),
    Stop,
}

impl<H: Handler> fmt::Debug for Mail<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mail::Deliver(envelope) => f.debug_tuple("Deliver").field(envelope).finish(),
            Mail::Stop => f.write_str("Stop"),
        }
    }
}
