//! # System Lifecycle & Orchestration
//!
//! This module manages the runtime lifecycle of the ledger application: creating the shared
//! services, wiring them into the ledger actor, and shutting everything down in order.
//!
//! **Key Responsibilities:**
//! 1. **Service Creation** - Journal store pool and event bus, built from
//!    [`RuntimeConfig`](actor_runtime::RuntimeConfig)
//! 2. **Dependency Injection** - Hand the pool and bus to the ledger via its `Context`
//! 3. **Lifecycle Management** - Start the ledger with the shared scheduler attached
//! 4. **Graceful Shutdown** - Stop the ledger, close the pool, await every task
//! 5. **Observability Setup** - [`setup_tracing`] re-exported from the runtime
//!
//! ## The LedgerSystem Pattern
//!
//! ```rust,ignore
//! let system = LedgerSystem::new(RuntimeConfig::from_env()?, JournalStore::new())?;
//! let mut events = system.events.subscribe();
//!
//! system.ledger.open_account("alice".into()).await?;
//! system.ledger.deposit("alice".into(), 500).await?;
//!
//! system.shutdown().await?;
//! ```
//!
//! ## Graceful Shutdown
//!
//! 1. **Stop the ledger** - a `Stop` request queued behind any pending mail
//! 2. **Await actors** - via [`ActorSystem::shutdown`](actor_runtime::ActorSystem::shutdown),
//!    which also cancels timers
//! 3. **Close the pool** - idle connections are retired
//! 4. **Close the bus** - subscribers drain and then see `Closed`

pub mod ledger_system;

pub use actor_runtime::tracing::{setup_tracing, try_setup_tracing};
pub use ledger_system::*;
