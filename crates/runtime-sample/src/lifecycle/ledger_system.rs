use crate::clients::LedgerClient;
use crate::ledger_actor::{Balances, LedgerDeps, LedgerHandler};
use crate::model::{JournalStore, LedgerEvent, StoreFactory};
use actor_runtime::{
    ActorClient, ActorError, ActorSystem, EventBus, Pool, RuntimeConfig, RuntimeError,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default interval between scheduled ledger audits.
pub const AUDIT_INTERVAL_DEFAULT: Duration = Duration::from_secs(60);

/// The orchestrator for the ledger application.
///
/// `LedgerSystem` is responsible for:
/// - **Lifecycle Management**: Starting and stopping the ledger actor
/// - **Dependency Wiring**: Handing the store pool and event bus to the ledger
/// - **Resource Coordination**: Owning the shared scheduler through [`ActorSystem`]
///
/// # Example
///
/// ```ignore
/// let system = LedgerSystem::new(RuntimeConfig::default(), JournalStore::new())?;
/// system.ledger.open_account("alice".into()).await?;
/// system.shutdown().await?;
/// ```
pub struct LedgerSystem {
    /// Client for interacting with the Ledger actor
    pub ledger: LedgerClient,

    /// Bus carrying every committed ledger change
    pub events: EventBus<LedgerEvent>,

    /// Pool of journal store connections
    pub store: Pool<StoreFactory>,

    runtime: ActorSystem,
}

impl LedgerSystem {
    /// Creates the system with periodic audits every [`AUDIT_INTERVAL_DEFAULT`].
    pub fn new(config: RuntimeConfig, journal: JournalStore) -> Result<Self, RuntimeError> {
        Self::with_audit_interval(config, journal, Some(AUDIT_INTERVAL_DEFAULT))
    }

    /// Creates the system; `audit_every = None` disables periodic audits.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_audit_interval(
        config: RuntimeConfig,
        journal: JournalStore,
        audit_every: Option<Duration>,
    ) -> Result<Self, RuntimeError> {
        let ask_timeout = config.ask_timeout;
        let runtime = ActorSystem::new(config)?;

        // 1. Shared services
        let store = runtime.pool(journal.factory())?;
        let events = runtime.event_bus::<LedgerEvent>();

        // 2. Start the ledger with injected context
        let deps = LedgerDeps {
            store: store.clone(),
            events: events.clone(),
            audit_every,
        };
        let reference = runtime.spawn_with(LedgerHandler, Balances::new(), deps);
        info!(ledger = %reference.id(), "Ledger system started");

        Ok(Self {
            ledger: LedgerClient::new(reference).with_ask_timeout(ask_timeout),
            events,
            store,
            runtime,
        })
    }

    pub fn runtime(&self) -> &ActorSystem {
        &self.runtime
    }

    /// Gracefully shuts down the entire system.
    ///
    /// Returns an error if an actor task could not be joined.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        info!("Shutting down ledger system...");

        match self.ledger.inner().stop().await {
            Ok(()) => {}
            Err(ActorError::MailboxClosed) => debug!("Ledger already terminated"),
            Err(e) => warn!(error = %e, "Failed to stop ledger"),
        }
        drop(self.ledger);

        let result = self.runtime.shutdown().await;
        self.store.close();
        self.events.close();
        result
    }
}
