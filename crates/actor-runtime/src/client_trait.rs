//! # ActorClient Trait
//!
//! Provides a common interface for domain-specific clients, adding default `tell` and
//! `request` methods built on top of a generic `ActorRef`.
use crate::config::ASK_TIMEOUT_DEFAULT;
use crate::{ActorError, ActorRef, Handler};
use async_trait::async_trait;
use std::time::Duration;

/// Trait for domain-specific clients to inherit typed messaging.
///
/// This trait reduces boilerplate by providing default implementations for
/// fire-and-forget delivery and request/response with the client's timeout.
///
/// # Example
///
/// ```rust
/// use actor_runtime::{ActorClient, ActorError, ActorRef, FnHandler};
/// use async_trait::async_trait;
///
/// type Counter = FnHandler<u64, u64, u64, fn(u64, u64) -> (u64, Option<u64>)>;
///
/// #[derive(Debug)]
/// struct CounterError(String);
///
/// // 1. Define Client Wrapper
/// struct CounterClient {
///     inner: ActorRef<Counter>,
/// }
///
/// // 2. Implement ActorClient
/// #[async_trait]
/// impl ActorClient<Counter> for CounterClient {
///     type Error = CounterError;
///
///     fn inner(&self) -> &ActorRef<Counter> {
///         &self.inner
///     }
///
///     fn map_error(e: ActorError) -> Self::Error {
///         CounterError(e.to_string())
///     }
/// }
///
/// // 3. Usage
/// async fn usage(client: CounterClient) {
///     // tell() and request() are provided automatically!
///     let _ = client.tell(1).await;
///     let _ = client.request(2).await;
/// }
/// ```
#[async_trait]
pub trait ActorClient<H: Handler>: Send + Sync {
    /// The domain-specific error type.
    type Error: Send + Sync;

    /// Access the inner generic ActorRef.
    fn inner(&self) -> &ActorRef<H>;

    /// Map runtime errors to the domain error type.
    fn map_error(e: ActorError) -> Self::Error;

    /// Timeout applied by [`request`](Self::request).
    fn ask_timeout(&self) -> Duration {
        ASK_TIMEOUT_DEFAULT
    }

    /// Send a message without waiting for a reply.
    #[tracing::instrument(skip(self))]
    async fn tell(&self, message: H::Message) -> Result<(), Self::Error> {
        tracing::debug!("Sending message");
        self.inner().send(message).await.map_err(Self::map_error)
    }

    /// Send a message and wait for the reply.
    #[tracing::instrument(skip(self))]
    async fn request(&self, message: H::Message) -> Result<H::Reply, Self::Error> {
        tracing::debug!("Sending request");
        self.inner()
            .ask(message, self.ask_timeout())
            .await
            .map_err(Self::map_error)
    }
}
