//! # Ledger Actor
//!
//! This module implements the Ledger actor: account balances kept in actor state, every
//! change journaled through a pooled store connection and announced on the event bus.
//!
//! ## Structure
//!
//! - [`handler`] - [`Handler`](actor_runtime::Handler) implementation and injected [`LedgerDeps`]
//! - [`messages`] - [`LedgerMessage`] and [`LedgerReply`]
//! - [`error`] - [`LedgerError`] type for type-safe error handling
//! - [`new()`] - Factory function that creates the actor and its client
//!
//! ## Usage
//!
//! ```rust
//! use actor_runtime::{EventBus, Pool, PoolConfig};
//! use runtime_sample::ledger_actor::{self, LedgerDeps};
//! use runtime_sample::model::JournalStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = JournalStore::new();
//!     let deps = LedgerDeps {
//!         store: Pool::new(store.factory(), PoolConfig::default())?,
//!         events: EventBus::default(),
//!         audit_every: None,
//!     };
//!
//!     // Create actor and client, then start the actor with its dependencies
//!     let (actor, client) = ledger_actor::new();
//!     tokio::spawn(actor.run(deps));
//!
//!     client.open_account("alice".into()).await?;
//!     let balance = client.deposit("alice".into(), 250).await?;
//!     assert_eq!(balance, 250);
//!     Ok(())
//! }
//! ```
//!
//! ## Key Features
//!
//! - **Pooled persistence**: each change borrows a connection and returns it when done
//! - **Events**: `Opened`, `Deposited`, `Withdrawn`, `Audited` published in commit order
//! - **Scheduled audits**: `audit_every` re-sends `Audit` to the actor through the scheduler

pub mod error;
pub mod handler;
pub mod messages;

pub use error::*;
pub use handler::*;
pub use messages::*;

use crate::clients::LedgerClient;
use actor_runtime::Actor;

/// Mailbox capacity of a ledger created by [`new()`].
pub const LEDGER_MAILBOX_CAPACITY: usize = 32;

/// Creates a new Ledger actor and its client.
pub fn new() -> (Actor<LedgerHandler>, LedgerClient) {
    let (actor, reference) = Actor::new(LedgerHandler, Balances::new(), LEDGER_MAILBOX_CAPACITY);
    (actor, LedgerClient::new(reference))
}
