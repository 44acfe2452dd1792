//! # Actor Runtime
//!
//! This crate provides the building blocks for concurrent programs built from isolated,
//! message-driven actors, together with the shared services such programs usually need:
//! a bounded **resource pool**, a **scheduler** for deferred and periodic work, and a
//! publish/subscribe **event bus**.
//!
//! **Further Reading**:
//! - [Actor Model (Wikipedia)](https://en.wikipedia.org/wiki/Actor_model) - Foundational
//!   concurrency pattern by Carl Hewitt
//! - [Actors in Rust](https://ryhl.io/blog/actors-with-tokio/) - Practical guide to
//!   implementing actors with Tokio
//!
//! ## Architecture Overview
//!
//! The runtime separates concerns into three layers:
//!
//! 1. **Behaviour Layer** ([`Handler`]) - Your state transitions and replies
//! 2. **Runtime Layer** ([`Actor`]) - Mailbox, dispatch loop, failure isolation
//! 3. **Interface Layer** ([`ActorRef`], [`ActorClient`]) - Type-safe communication
//!
//! Shared services sit beside the actors and are injected into them as context:
//!
//! | Service | Type | Purpose |
//! |---------|------|---------|
//! | Pool | [`Pool`] | At most `max_size` expensive resources, reused LIFO, idle ones retired |
//! | Scheduler | [`Scheduler`] | Run a callable once after a delay, or every period without drift |
//! | Event Bus | [`EventBus`] | Fan events out to independent, bounded subscriptions |
//!
//! [`ActorSystem`] wires all of it from one [`RuntimeConfig`].
//!
//! ## Core Abstractions
//!
//! ### [`Handler`] - The Behaviour
//!
//! ```rust
//! use actor_runtime::{ActorContext, ActorSystem, Handled, Handler, RuntimeConfig};
//! use async_trait::async_trait;
//! use std::convert::Infallible;
//!
//! struct Counter;
//!
//! #[derive(Debug)]
//! enum CounterMessage {
//!     Add(u64),
//!     Get,
//! }
//!
//! #[async_trait]
//! impl Handler for Counter {
//!     type State = u64;
//!     type Message = CounterMessage;
//!     type Reply = u64;
//!     type Error = Infallible;
//!     type Context = ();
//!
//!     async fn handle(
//!         &self,
//!         total: u64,
//!         message: CounterMessage,
//!         _ctx: &ActorContext<Self>,
//!     ) -> Handled<Self> {
//!         match message {
//!             CounterMessage::Add(n) => Ok((total + n, None)),
//!             CounterMessage::Get => Ok((total, Some(total))),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let system = ActorSystem::new(RuntimeConfig::default()).unwrap();
//!     let counter = system.spawn(Counter, 0);
//!
//!     counter.send(CounterMessage::Add(2)).await.unwrap();
//!     counter.send(CounterMessage::Add(3)).await.unwrap();
//!     let total = counter.ask(CounterMessage::Get, system.config().ask_timeout).await.unwrap();
//!     assert_eq!(total, 5);
//!
//!     counter.stop().await.unwrap();
//!     system.shutdown().await.unwrap();
//! }
//! ```
//!
//! ## Context Injection Pattern
//!
//! Dependencies are injected when the actor starts running (`Actor::run(context)` or
//! [`ActorSystem::spawn_with`]), not at construction. A handler declares what it needs
//! through its `Context` associated type, e.g. `(Pool<ConnFactory>, EventBus<LedgerEvent>)`,
//! and reads it with [`ActorContext::deps`].
//!
//! ## Failure Isolation
//!
//! A handler that returns `Err` or panics terminates **only its own actor**. The error is
//! logged with the actor id and handler type, pending `ask` callers see
//! [`ActorError::AskChannelClosed`], later sends see [`ActorError::MailboxClosed`], and the
//! dispatch loop returns [`ActorExit::Failed`] or [`ActorExit::Panicked`]. Nothing is
//! restarted.
//!
//! ## Concurrency Model
//!
//! - Each actor runs in its own Tokio task
//! - Messages are processed **sequentially** within an actor (no locks on state)
//! - Messages from one sender arrive in the order they were sent
//! - Waiting (`ask`, pool `acquire`, bus backpressure, timers) suspends the task, never a
//!   worker thread
//!
//! ## Testing
//!
//! The [`mock`] module provides `MockActor`, which hands out a real [`ActorRef`] backed by
//! scripted replies. Time-dependent code (timeouts, pool TTLs, scheduling) is tested with
//! Tokio's paused clock (`#[tokio::test(start_paused = true)]`).

pub mod actor;
pub mod bus;
pub mod client_trait;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod mock;
pub mod pool;
pub mod reference;
pub mod scheduler;
pub mod system;
pub mod tracing;

// Re-export core types for convenience
pub use actor::{Actor, ActorExit};
pub use bus::{BusConfig, EventBus, OverflowPolicy, Subscription, SubscriptionId};
pub use client_trait::ActorClient;
pub use config::RuntimeConfig;
pub use error::{ActorError, BusError, ConfigError, PoolError, RuntimeError, SchedulerError};
pub use handler::{
    handler_fn, try_handler_fn, ActorContext, FnHandler, Handled, Handler, TryFnHandler,
};
pub use pool::{Pool, PoolConfig, PoolStats, PoolToken, ResourceFactory, SlotId, SlotState};
pub use reference::{ActorId, ActorRef, WeakActorRef};
pub use scheduler::{Scheduler, TaskHandle, TaskId};
pub use system::ActorSystem;
