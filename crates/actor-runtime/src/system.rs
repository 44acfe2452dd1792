//! # System Lifecycle & Orchestration
//!
//! [`ActorSystem`] is the "conductor" for a set of actors and the services they share:
//!
//! 1. **Actor Creation** - spawn actors with the configured mailbox size and the shared
//!    scheduler attached
//! 2. **Dependency Injection** - hand each actor its `Context` when it starts running
//! 3. **Shared Services** - build pools (with their idle sweep scheduled) and buses from
//!    one [`RuntimeConfig`]
//! 4. **Graceful Shutdown** - stop the scheduler and await every actor task
//!
//! ## Graceful Shutdown
//!
//! [`ActorSystem::shutdown`] does not stop actors itself. Callers stop them (or drop
//! every reference) first; the system then awaits each actor task. Actors that exit
//! through a handler failure are logged but are not a shutdown error: isolation means one
//! actor's failure never affects the others. Only a task that could not be joined (the
//! loop itself panicked, or the task was aborted) is reported.

use crate::actor::{Actor, ActorExit};
use crate::bus::EventBus;
use crate::config::RuntimeConfig;
use crate::error::{ConfigError, RuntimeError};
use crate::handler::Handler;
use crate::pool::{Pool, ResourceFactory};
use crate::reference::{ActorId, ActorRef};
use crate::scheduler::Scheduler;
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Owns the scheduler and the join handles of every actor it spawned.
///
/// # Example
///
/// ```rust
/// use actor_runtime::{handler_fn, ActorSystem, RuntimeConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let system = ActorSystem::new(RuntimeConfig::default()).unwrap();
///     let echo = system.spawn(handler_fn(|_: (), text: String| ((), Some(text))), ());
///
///     let reply = echo.ask("hi".into(), system.config().ask_timeout).await.unwrap();
///     assert_eq!(reply, "hi");
///
///     echo.stop().await.unwrap();
///     system.shutdown().await.unwrap();
/// }
/// ```
pub struct ActorSystem {
    config: RuntimeConfig,
    scheduler: Scheduler,
    handles: Mutex<Vec<(ActorId, JoinHandle<ActorExit>)>>,
}

impl ActorSystem {
    /// Validates `config` and starts the shared scheduler.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            scheduler: Scheduler::start(),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Spawn an actor without dependencies.
    pub fn spawn<H>(&self, handler: H, state: H::State) -> ActorRef<H>
    where
        H: Handler<Context = ()>,
    {
        self.spawn_with(handler, state, ())
    }

    /// Spawn an actor and inject `deps` as its context.
    pub fn spawn_with<H: Handler>(
        &self,
        handler: H,
        state: H::State,
        deps: H::Context,
    ) -> ActorRef<H> {
        self.spawn_bounded(handler, state, deps, self.config.mailbox_capacity)
    }

    /// Spawn an actor with its own mailbox capacity.
    pub fn spawn_bounded<H: Handler>(
        &self,
        handler: H,
        state: H::State,
        deps: H::Context,
        mailbox_capacity: usize,
    ) -> ActorRef<H> {
        let (actor, reference) = Actor::new(handler, state, mailbox_capacity);
        let actor = actor.with_scheduler(self.scheduler.clone());
        let handle = tokio::spawn(actor.run(deps));
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((reference.id(), handle));
        reference
    }

    /// A new bus using the configured capacity and overflow policy.
    pub fn event_bus<E: Clone + Send + Sync + 'static>(&self) -> EventBus<E> {
        EventBus::unchecked(self.config.bus)
    }

    /// A new pool using the configured limits, with its idle sweep scheduled.
    pub fn pool<F: ResourceFactory>(&self, factory: F) -> Result<Pool<F>, RuntimeError> {
        let pool = Pool::new(factory, self.config.pool.clone())?;
        pool.schedule_sweep(&self.scheduler)?;
        Ok(pool)
    }

    /// Number of actors spawned whose task has not finished yet.
    pub fn running(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Gracefully shuts down the system.
    ///
    /// This method:
    /// 1. Shuts the scheduler down, cancelling pending timers
    /// 2. Waits for every actor task to complete
    /// 3. Returns an error if any actor task could not be joined
    ///
    /// Actors must already have been stopped, or have lost all their references;
    /// otherwise this waits for them.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        info!("Shutting down system...");
        self.scheduler.shutdown();

        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut failure = None;
        for (id, handle) in handles {
            match handle.await {
                Ok(exit) if exit.is_graceful() => {}
                Ok(exit) => warn!(actor = %id, reason = %exit, "Actor ended abnormally"),
                Err(e) => {
                    error!(actor = %id, error = %e, "Actor task failed");
                    failure.get_or_insert_with(|| {
                        RuntimeError::ActorTaskFailed(format!("{id}: {e}"))
                    });
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                info!("System shutdown complete.");
                Ok(())
            }
        }
    }
}
