//! # Resource Pool
//!
//! A bounded pool of reusable, expensive-to-create resources with admission control.
//!
//! Admission is a fair (FIFO) semaphore with `max_size` permits: a [`PoolToken`] holds
//! one permit for as long as it lives, so the number of checked-out resources can never
//! exceed `max_size`. Once admitted, a caller takes the most recently returned idle
//! slot, or asks the [`ResourceFactory`] for a new one when none is idle.
//!
//! Slot lifecycle:
//!
//! ```text
//!   create ──► CheckedOut ──release/drop──► Idle ──acquire──► CheckedOut
//!                   │                        │
//!                discard                idle > idle_ttl
//!                   ▼                        ▼
//!                Retired                  Retired
//! ```
//!
//! Idle slots are retired by [`Pool::retire_idle`], which
//! [`Pool::schedule_sweep`] runs periodically through the [`Scheduler`].
//! [`Pool::slot_state`] reports where a slot currently is.
//!
//! ```rust
//! use actor_runtime::{Pool, PoolConfig, ResourceFactory};
//! use async_trait::async_trait;
//!
//! struct Numbers;
//!
//! #[async_trait]
//! impl ResourceFactory for Numbers {
//!     type Resource = Vec<u32>;
//!     type Error = std::io::Error;
//!
//!     async fn create(&self) -> Result<Vec<u32>, Self::Error> {
//!         Ok(Vec::with_capacity(1024))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = Pool::new(Numbers, PoolConfig::default().with_max_size(2)).unwrap();
//!     let mut buffer = pool.acquire().await.unwrap();
//!     buffer.push(7);
//!     buffer.release();
//!     assert_eq!(pool.stats().idle, 1);
//! }
//! ```

use crate::error::{ConfigError, PoolError, SchedulerError};
use crate::scheduler::{Scheduler, TaskHandle};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default maximum pool size
pub const POOL_SIZE_MAX_DEFAULT: usize = 10;

/// Default idle lifetime (10 minutes)
pub const POOL_IDLE_TTL_DEFAULT: Duration = Duration::from_secs(600);

/// Default acquire timeout (30 seconds)
pub const POOL_ACQUIRE_TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);

/// Default interval between idle sweeps
pub const POOL_SWEEP_INTERVAL_DEFAULT: Duration = Duration::from_secs(30);

/// Creates (and optionally tears down) pooled resources.
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    type Resource: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build a new resource. Called while the caller holds an admission permit.
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Release a retired resource. The default just drops it.
    fn retire(&self, _resource: Self::Resource) {}
}

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of slots (idle + checked out)
    pub max_size: usize,
    /// How long a slot may sit idle before it is retired
    pub idle_ttl: Duration,
    /// Default wait for [`Pool::acquire`]; `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,
    /// Interval used by [`Pool::schedule_sweep`]
    pub sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: POOL_SIZE_MAX_DEFAULT,
            idle_ttl: POOL_IDLE_TTL_DEFAULT,
            acquire_timeout: Some(POOL_ACQUIRE_TIMEOUT_DEFAULT),
            sweep_interval: POOL_SWEEP_INTERVAL_DEFAULT,
        }
    }
}

impl PoolConfig {
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::Invalid {
                field: "pool.max_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.max_size > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid {
                field: "pool.max_size",
                reason: format!("cannot exceed {}", Semaphore::MAX_PERMITS),
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "pool.sweep_interval",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Slot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    CheckedOut,
    Retired,
}

/// Stable identity of a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub max_size: usize,
    /// Slots waiting to be reused
    pub idle: usize,
    /// Slots currently lent out
    pub checked_out: usize,
    pub total_created: u64,
    pub total_retired: u64,
    pub total_acquired: u64,
    pub acquire_timeouts: u64,
}

struct IdleSlot<R> {
    id: SlotId,
    resource: R,
    idle_since: Instant,
}

#[derive(Default)]
struct PoolCounters {
    total_created: AtomicU64,
    total_retired: AtomicU64,
    total_acquired: AtomicU64,
    acquire_timeouts: AtomicU64,
}

/// Every live slot is in exactly one of `idle` or `lent`.
struct Slots<R> {
    /// Most recently returned slot is at the back.
    idle: Vec<IdleSlot<R>>,
    lent: HashSet<SlotId>,
    closed: bool,
}

impl<R> Default for Slots<R> {
    fn default() -> Self {
        Self {
            idle: Vec::new(),
            lent: HashSet::new(),
            closed: false,
        }
    }
}

struct PoolShared<F: ResourceFactory> {
    factory: F,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    slots: Mutex<Slots<F::Resource>>,
    counters: PoolCounters,
    next_slot: AtomicU64,
}

impl<F: ResourceFactory> PoolShared<F> {
    fn slots(&self) -> MutexGuard<'_, Slots<F::Resource>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retire(&self, id: SlotId, resource: F::Resource, reason: &'static str) {
        self.counters.total_retired.fetch_add(1, Ordering::Relaxed);
        debug!(slot = %id, reason, "Retired");
        self.factory.retire(resource);
    }

    fn give_back(&self, id: SlotId, resource: F::Resource) {
        let mut slots = self.slots();
        slots.lent.remove(&id);
        if slots.closed {
            drop(slots);
            self.retire(id, resource, "pool closed");
            return;
        }
        slots.idle.push(IdleSlot {
            id,
            resource,
            idle_since: Instant::now(),
        });
        drop(slots);
        debug!(slot = %id, "Returned");
    }
}

/// A bounded pool of reusable resources.
///
/// Cheap to clone; clones share the same slots.
pub struct Pool<F: ResourceFactory> {
    shared: Arc<PoolShared<F>>,
}

impl<F: ResourceFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<F: ResourceFactory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("stats", &self.stats()).finish()
    }
}

impl<F: ResourceFactory> Pool<F> {
    /// Create a new, empty pool. Slots are created lazily on demand.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                factory,
                permits: Arc::new(Semaphore::new(config.max_size)),
                config,
                slots: Mutex::new(Slots::default()),
                counters: PoolCounters::default(),
                next_slot: AtomicU64::new(1),
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Acquire a resource, waiting up to the configured `acquire_timeout`.
    pub async fn acquire(&self) -> Result<PoolToken<F>, PoolError> {
        match self.shared.config.acquire_timeout {
            Some(timeout) => self.acquire_timeout(timeout).await,
            None => {
                let permit = self
                    .shared
                    .permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| PoolError::Closed)?;
                self.checkout(permit).await
            }
        }
    }

    /// Acquire a resource, waiting at most `timeout` for a slot to free up.
    ///
    /// Waiters are served in FIFO order. On timeout the wait is abandoned and
    /// [`PoolError::AcquireTimedOut`] is returned.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<PoolToken<F>, PoolError> {
        let permits = self.shared.permits.clone();
        let permit = match tokio::time::timeout(timeout, permits.acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                self.shared
                    .counters
                    .acquire_timeouts
                    .fetch_add(1, Ordering::Relaxed);
                warn!(?timeout, max_size = self.shared.config.max_size, "Pool acquire timed out");
                return Err(PoolError::AcquireTimedOut(timeout));
            }
        };
        self.checkout(permit).await
    }

    /// Acquire a resource without waiting.
    ///
    /// Fails with [`PoolError::Exhausted`] when every slot is checked out.
    pub async fn try_acquire(&self) -> Result<PoolToken<F>, PoolError> {
        let permit = match self.shared.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
            Err(TryAcquireError::NoPermits) => {
                return Err(PoolError::Exhausted {
                    max_size: self.shared.config.max_size,
                })
            }
        };
        self.checkout(permit).await
    }

    async fn checkout(&self, permit: OwnedSemaphorePermit) -> Result<PoolToken<F>, PoolError> {
        let shared = &self.shared;
        let ttl = shared.config.idle_ttl;

        let mut expired = Vec::new();
        let reused = {
            let mut slots = shared.slots();
            let reused = loop {
                match slots.idle.pop() {
                    Some(slot) if slot.idle_since.elapsed() >= ttl => expired.push(slot),
                    other => break other,
                }
            };
            if let Some(slot) = &reused {
                slots.lent.insert(slot.id);
            }
            reused
        };
        for slot in expired {
            shared.retire(slot.id, slot.resource, "idle ttl elapsed");
        }

        let (id, resource) = match reused {
            Some(slot) => (slot.id, slot.resource),
            None => {
                let resource = shared
                    .factory
                    .create()
                    .await
                    .map_err(|e| PoolError::Create(Box::new(e)))?;
                let id = SlotId(shared.next_slot.fetch_add(1, Ordering::Relaxed));
                shared.counters.total_created.fetch_add(1, Ordering::Relaxed);
                shared.slots().lent.insert(id);
                debug!(slot = %id, "Created");
                (id, resource)
            }
        };

        shared.counters.total_acquired.fetch_add(1, Ordering::Relaxed);
        Ok(PoolToken {
            slot: Some((id, resource)),
            pool: self.shared.clone(),
            _permit: permit,
        })
    }

    /// Retire every idle slot that has been idle for at least `idle_ttl`.
    /// Returns the number of slots retired.
    pub fn retire_idle(&self) -> usize {
        let shared = &self.shared;
        let ttl = shared.config.idle_ttl;
        let expired: Vec<_> = {
            let mut slots = shared.slots();
            let (expired, fresh): (Vec<_>, Vec<_>) = std::mem::take(&mut slots.idle)
                .into_iter()
                .partition(|slot| slot.idle_since.elapsed() >= ttl);
            slots.idle = fresh;
            expired
        };
        let count = expired.len();
        for slot in expired {
            shared.retire(slot.id, slot.resource, "idle ttl elapsed");
        }
        if count > 0 {
            info!(retired = count, "Idle sweep");
        }
        count
    }

    /// Run [`retire_idle`](Self::retire_idle) every `sweep_interval` on `scheduler`.
    ///
    /// The sweep holds only a weak reference; it becomes a no-op once every pool
    /// handle is dropped.
    pub fn schedule_sweep(&self, scheduler: &Scheduler) -> Result<TaskHandle, SchedulerError> {
        let pool = Arc::downgrade(&self.shared);
        scheduler.schedule_every(self.shared.config.sweep_interval, move || {
            let pool = pool.clone();
            async move {
                if let Some(shared) = pool.upgrade() {
                    Pool { shared }.retire_idle();
                }
            }
        })
    }

    /// Reject further acquires and retire all idle slots. Tokens still checked out
    /// are retired when they come back.
    pub fn close(&self) {
        let shared = &self.shared;
        let idle = {
            let mut slots = shared.slots();
            slots.closed = true;
            std::mem::take(&mut slots.idle)
        };
        shared.permits.close();
        let count = idle.len();
        for slot in idle {
            shared.retire(slot.id, slot.resource, "pool closed");
        }
        info!(retired = count, "Pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.slots().closed
    }

    /// Where slot `id` is in its lifecycle, or `None` if this pool never created it.
    pub fn slot_state(&self, id: SlotId) -> Option<SlotState> {
        if id.0 == 0 || id.0 >= self.shared.next_slot.load(Ordering::Relaxed) {
            return None;
        }
        let slots = self.shared.slots();
        if slots.lent.contains(&id) {
            Some(SlotState::CheckedOut)
        } else if slots.idle.iter().any(|slot| slot.id == id) {
            Some(SlotState::Idle)
        } else {
            Some(SlotState::Retired)
        }
    }

    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        let (idle, checked_out) = {
            let slots = self.shared.slots();
            (slots.idle.len(), slots.lent.len())
        };
        PoolStats {
            max_size: self.shared.config.max_size,
            idle,
            checked_out,
            total_created: counters.total_created.load(Ordering::Relaxed),
            total_retired: counters.total_retired.load(Ordering::Relaxed),
            total_acquired: counters.total_acquired.load(Ordering::Relaxed),
            acquire_timeouts: counters.acquire_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive loan of one pooled resource.
///
/// Dereferences to the resource. Dropping the token (or calling
/// [`release`](Self::release)) returns the slot to `Idle`; this is the only path back.
pub struct PoolToken<F: ResourceFactory> {
    slot: Option<(SlotId, F::Resource)>,
    pool: Arc<PoolShared<F>>,
    // Dropped after `Drop::drop` has pushed the slot back, so the next waiter finds it idle.
    _permit: OwnedSemaphorePermit,
}

impl<F: ResourceFactory> PoolToken<F> {
    pub fn slot_id(&self) -> SlotId {
        match &self.slot {
            Some((id, _)) => *id,
            None => unreachable!("slot is present until the token is consumed"),
        }
    }

    /// Return the resource to the pool.
    pub fn release(self) {
        drop(self)
    }

    /// Retire the resource instead of returning it, e.g. because it is broken.
    pub fn discard(mut self) {
        if let Some((id, resource)) = self.slot.take() {
            self.pool.slots().lent.remove(&id);
            self.pool.retire(id, resource, "discarded");
        }
    }
}

impl<F: ResourceFactory> Deref for PoolToken<F> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        match &self.slot {
            Some((_, resource)) => resource,
            None => unreachable!("slot is present until the token is consumed"),
        }
    }
}

impl<F: ResourceFactory> DerefMut for PoolToken<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.slot {
            Some((_, resource)) => resource,
            None => unreachable!("slot is present until the token is consumed"),
        }
    }
}

impl<F: ResourceFactory> Drop for PoolToken<F> {
    fn drop(&mut self) {
        if let Some((id, resource)) = self.slot.take() {
            self.pool.give_back(id, resource);
        }
    }
}

impl<F: ResourceFactory> fmt::Debug for PoolToken<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolToken")
            .field("slot", &self.slot.as_ref().map(|(id, _)| *id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Conn {
        serial: usize,
    }

    #[derive(Default)]
    struct ConnFactory {
        created: AtomicUsize,
        retired: Arc<AtomicUsize>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("connect refused")]
    struct ConnectRefused;

    #[async_trait]
    impl ResourceFactory for ConnFactory {
        type Resource = Conn;
        type Error = ConnectRefused;

        async fn create(&self) -> Result<Conn, ConnectRefused> {
            let serial = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Conn { serial })
        }

        fn retire(&self, _resource: Conn) {
            self.retired.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct RefusingFactory;

    #[async_trait]
    impl ResourceFactory for RefusingFactory {
        type Resource = Conn;
        type Error = ConnectRefused;

        async fn create(&self) -> Result<Conn, ConnectRefused> {
            Err(ConnectRefused)
        }
    }

    fn pool(max_size: usize) -> Pool<ConnFactory> {
        Pool::new(ConnFactory::default(), PoolConfig::default().with_max_size(max_size)).unwrap()
    }

    #[test]
    fn test_config_rejects_zero_size() {
        let result = Pool::new(ConnFactory::default(), PoolConfig::default().with_max_size(0));
        assert!(matches!(result, Err(ConfigError::Invalid { field: "pool.max_size", .. })));
    }

    #[tokio::test]
    async fn test_reuses_most_recently_returned_slot() {
        let pool = pool(3);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let (a_id, b_id) = (a.slot_id(), b.slot_id());

        a.release();
        b.release();

        let next = pool.acquire().await.unwrap();
        assert_eq!(next.slot_id(), b_id);
        assert_ne!(next.slot_id(), a_id);
        assert_eq!(pool.stats().total_created, 2);
    }

    #[tokio::test]
    async fn test_never_lends_same_slot_twice() {
        let pool = pool(4);
        let mut tokens = Vec::new();
        for _ in 0..4 {
            tokens.push(pool.acquire().await.unwrap());
        }
        let ids: HashSet<_> = tokens.iter().map(|t| t.slot_id()).collect();
        let serials: HashSet<_> = tokens.iter().map(|t| t.serial).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(serials.len(), 4);
        assert_eq!(pool.stats().checked_out, 4);

        let err = pool.try_acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { max_size: 4 }));
    }

    #[tokio::test]
    async fn test_single_slot_acquire_release_never_blocks() {
        let pool = pool(1);
        for _ in 0..100 {
            let token = pool
                .acquire_timeout(Duration::from_millis(10))
                .await
                .expect("slot should be free");
            token.release();
        }
        let stats = pool.stats();
        assert_eq!(stats.total_created, 1);
        assert_eq!(stats.total_acquired, 100);
        assert_eq!(stats.acquire_timeouts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_when_exhausted() {
        let pool = pool(1);
        let _held = pool.acquire().await.unwrap();
        let start = Instant::now();

        let err = pool.acquire_timeout(Duration::from_millis(200)).await.unwrap_err();

        assert!(matches!(err, PoolError::AcquireTimedOut(d) if d == Duration::from_millis(200)));
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(pool.stats().acquire_timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_slots_retire_after_ttl() {
        let factory = ConnFactory::default();
        let retired = factory.retired.clone();
        let config = PoolConfig::default()
            .with_max_size(3)
            .with_idle_ttl(Duration::from_secs(60));
        let pool = Pool::new(factory, config).unwrap();

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        a.release();
        tokio::time::sleep(Duration::from_secs(45)).await;
        b.release();
        tokio::time::sleep(Duration::from_secs(20)).await;

        // Only `a` has been idle for a full minute.
        assert_eq!(pool.retire_idle(), 1);
        assert_eq!(retired.load(Ordering::SeqCst), 1);
        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.total_retired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_slot_is_not_handed_out() {
        let config = PoolConfig::default()
            .with_max_size(1)
            .with_idle_ttl(Duration::from_secs(5));
        let pool = Pool::new(ConnFactory::default(), config).unwrap();

        let first = pool.acquire().await.unwrap();
        let first_id = first.slot_id();
        first.release();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let second = pool.acquire().await.unwrap();
        assert_ne!(second.slot_id(), first_id);
        assert_eq!(pool.stats().total_retired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_sweep_retires_idle_slots() {
        let scheduler = Scheduler::start();
        let config = PoolConfig::default()
            .with_max_size(2)
            .with_idle_ttl(Duration::from_secs(10))
            .with_sweep_interval(Duration::from_secs(5));
        let pool = Pool::new(ConnFactory::default(), config).unwrap();
        pool.schedule_sweep(&scheduler).unwrap();

        pool.acquire().await.unwrap().release();
        assert_eq!(pool.stats().idle, 1);

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(pool.stats().total_retired, 1);
    }

    #[tokio::test]
    async fn test_discard_frees_capacity_without_returning() {
        let pool = pool(1);
        let token = pool.acquire().await.unwrap();
        let broken = token.slot_id();
        token.discard();

        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.checked_out, 0);
        let fresh = pool.try_acquire().await.unwrap();
        assert_ne!(fresh.slot_id(), broken);
    }

    #[tokio::test]
    async fn test_factory_failure_releases_permit() {
        let pool = Pool::new(RefusingFactory, PoolConfig::default().with_max_size(1)).unwrap();
        for _ in 0..3 {
            let err = pool.try_acquire().await.unwrap_err();
            assert!(matches!(err, PoolError::Create(_)));
        }
        assert_eq!(pool.stats().checked_out, 0);
    }

    #[tokio::test]
    async fn test_close_rejects_acquire_and_retires_returns() {
        let pool = pool(2);
        let held = pool.acquire().await.unwrap();
        pool.acquire().await.unwrap().release();

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.stats().idle, 0);
        assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));

        held.release();
        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.total_retired, 2);
    }

    #[tokio::test]
    async fn test_slot_state_follows_lifecycle() {
        let pool = pool(1);
        assert_eq!(pool.slot_state(SlotId(1)), None);

        let token = pool.acquire().await.unwrap();
        let id = token.slot_id();
        assert_eq!(pool.slot_state(id), Some(SlotState::CheckedOut));

        token.release();
        assert_eq!(pool.slot_state(id), Some(SlotState::Idle));

        pool.acquire().await.unwrap().discard();
        assert_eq!(pool.slot_state(id), Some(SlotState::Retired));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_returns_racing_close_are_all_retired() {
        for _ in 0..20 {
            let factory = ConnFactory::default();
            let retired = factory.retired.clone();
            let pool = Pool::new(factory, PoolConfig::default().with_max_size(8)).unwrap();
            let mut tokens = Vec::new();
            for _ in 0..8 {
                tokens.push(pool.acquire().await.unwrap());
            }

            let returns: Vec<_> = tokens
                .into_iter()
                .map(|token| tokio::spawn(async move { token.release() }))
                .collect();
            pool.close();
            for handle in returns {
                handle.await.unwrap();
            }

            let stats = pool.stats();
            assert_eq!(stats.idle, 0);
            assert_eq!(stats.checked_out, 0);
            assert_eq!(retired.load(Ordering::SeqCst), 8);
        }
    }
}
