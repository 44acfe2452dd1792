//! # Journal Store
//!
//! A stand-in for an external database. Opening a [`StoreConnection`] is the expensive
//! part, so the ledger borrows connections from a [`Pool`](actor_runtime::Pool) built on
//! [`StoreFactory`].

use super::account::{AccountId, Cents};
use actor_runtime::ResourceFactory;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// One durable record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Open(AccountId),
    Credit(AccountId, Cents),
    Debit(AccountId, Cents),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Journal store is offline")]
    Offline,
}

#[derive(Debug, Default)]
struct StoreShared {
    journal: Mutex<Vec<JournalEntry>>,
    offline: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

/// Handle to the (in-memory) journal; clones observe the same journal.
#[derive(Debug, Clone, Default)]
pub struct JournalStore {
    shared: Arc<StoreShared>,
    connect_latency: Duration,
}

impl JournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect waits `latency` first.
    pub fn with_connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }

    /// Make new connections and writes fail, as if the store went away.
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.shared
            .journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.shared.disconnects.load(Ordering::SeqCst)
    }

    pub fn factory(&self) -> StoreFactory {
        StoreFactory {
            store: self.clone(),
        }
    }
}

/// An open connection to the journal.
#[derive(Debug)]
pub struct StoreConnection {
    serial: usize,
    store: Arc<StoreShared>,
}

impl StoreConnection {
    pub fn serial(&self) -> usize {
        self.serial
    }

    pub fn append(&mut self, entry: JournalEntry) -> Result<(), StoreError> {
        if self.store.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Offline);
        }
        debug!(connection = self.serial, ?entry, "Append");
        self.store
            .journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.store
            .journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens [`StoreConnection`]s for the pool.
#[derive(Debug, Clone)]
pub struct StoreFactory {
    store: JournalStore,
}

#[async_trait]
impl ResourceFactory for StoreFactory {
    type Resource = StoreConnection;
    type Error = StoreError;

    async fn create(&self) -> Result<StoreConnection, StoreError> {
        if !self.store.connect_latency.is_zero() {
            tokio::time::sleep(self.store.connect_latency).await;
        }
        let shared = &self.store.shared;
        if shared.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Offline);
        }
        let serial = shared.connects.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(connection = serial, "Connected");
        Ok(StoreConnection {
            serial,
            store: shared.clone(),
        })
    }

    fn retire(&self, connection: StoreConnection) {
        self.store.shared.disconnects.fetch_add(1, Ordering::SeqCst);
        debug!(connection = connection.serial, "Disconnected");
    }
}
