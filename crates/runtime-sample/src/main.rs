//! # Ledger Sample
//!
//! A small application built on `actor_runtime`.
//!
//! ## Core Components
//!
//! - **[ledger_actor](runtime_sample::ledger_actor)**: balances owned by a single actor
//! - **[model](runtime_sample::model)**: accounts, events and the journal store
//! - **[clients](runtime_sample::clients)**: the typed
//!   [`LedgerClient`](runtime_sample::clients::LedgerClient)
//! - **[lifecycle](runtime_sample::lifecycle)**: [`LedgerSystem`] orchestration
//!
//! ## Quick Start
//!
//! The demo:
//! 1.  Starts the [`LedgerSystem`] from environment configuration.
//! 2.  Subscribes a listener to the event bus.
//! 3.  Opens accounts, moves money, and audits.

use actor_runtime::{BusError, RuntimeConfig};
use runtime_sample::lifecycle::{setup_tracing, LedgerSystem};
use runtime_sample::model::{JournalStore, LedgerEvent};
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup tracing once for the entire application
    setup_tracing();

    let config = RuntimeConfig::from_env()?;
    info!(?config, "Starting ledger sample");

    let journal = JournalStore::new().with_connect_latency(Duration::from_millis(20));
    let system = LedgerSystem::with_audit_interval(
        config,
        journal.clone(),
        Some(Duration::from_millis(250)),
    )?;

    // Listener: log every event pushed from the bus
    let listener = system.events.subscribe().on_event(|next| match next {
        Ok(LedgerEvent::Audited(report)) => {
            info!(accounts = report.accounts, total = report.total, "Audit received")
        }
        Ok(event) => info!(?event, "Ledger event"),
        Err(BusError::SubscriberLagged(missed)) => warn!(missed, "Listener lagged"),
        Err(e) => error!(error = %e, "Listener stopped"),
    });

    let span = tracing::info_span!("account_setup");
    async {
        system.ledger.open_account("alice".into()).await?;
        system.ledger.open_account("bob".into()).await?;
        system.ledger.deposit("alice".into(), 10_000).await?;
        Ok::<_, runtime_sample::ledger_actor::LedgerError>(())
    }
    .instrument(span)
    .await?;

    let span = tracing::info_span!("transfers");
    async {
        for amount in [1_500, 2_500, 9_000] {
            match system.ledger.transfer("alice".into(), "bob".into(), amount).await {
                Ok(()) => info!(amount, "Transfer completed"),
                Err(e) => warn!(amount, error = %e, "Transfer refused"),
            }
        }
    }
    .instrument(span)
    .await;

    // Let at least one scheduled audit run
    tokio::time::sleep(Duration::from_millis(300)).await;

    let report = system.ledger.audit().await?;
    info!(?report, connects = journal.connects(), "Final audit");

    system.shutdown().await?;
    listener.await?;

    info!("Application completed successfully");
    Ok(())
}
