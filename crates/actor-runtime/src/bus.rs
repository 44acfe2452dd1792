//! # Event Bus
//!
//! Broadcast of published events to every live subscription.
//!
//! Each [`Subscription`] owns an independent bounded queue. A publish appends a clone of
//! the event to every queue registered at that moment; subscribers drain their own queue
//! at their own pace. What happens when a queue is full is decided by the bus's
//! [`OverflowPolicy`]:
//!
//! * [`OverflowPolicy::Backpressure`] makes the publisher wait until that subscriber
//!   frees a slot (or unsubscribes).
//! * [`OverflowPolicy::DropOldest`] evicts the oldest buffered event. The subscriber is
//!   told how many it missed through [`BusError::SubscriberLagged`] before it receives
//!   the next event.
//!
//! Lag is only ever reported to the subscriber that lagged.

use crate::error::{BusError, ConfigError};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default per-subscription buffer size
pub const BUS_CAPACITY_DEFAULT: usize = 64;

/// What a publish does when a subscription's buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for the subscriber to make room.
    #[default]
    Backpressure,
    /// Evict the oldest buffered event and report the gap as lag.
    DropOldest,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backpressure" => Ok(Self::Backpressure),
            "drop-oldest" | "drop_oldest" => Ok(Self::DropOldest),
            other => Err(ConfigError::Invalid {
                field: "bus.policy",
                reason: format!("unknown overflow policy '{other}'"),
            }),
        }
    }
}

/// Bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Buffer size of each subscription created by [`EventBus::subscribe`]
    pub capacity: usize,
    pub policy: OverflowPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: BUS_CAPACITY_DEFAULT,
            policy: OverflowPolicy::Backpressure,
        }
    }
}

impl BusConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "bus.capacity",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Identity of one subscription within its bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct QueueState<E> {
    buffer: VecDeque<E>,
    /// Events evicted since the subscriber last looked.
    lagged: u64,
    closed: bool,
}

struct SubscriberQueue<E> {
    capacity: usize,
    policy: OverflowPolicy,
    state: Mutex<QueueState<E>>,
    readable: Notify,
    writable: Notify,
}

impl<E> SubscriberQueue<E> {
    fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            capacity,
            policy,
            state: Mutex::new(QueueState {
                buffer: VecDeque::with_capacity(capacity.min(BUS_CAPACITY_DEFAULT)),
                lagged: 0,
                closed: false,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `event`, waiting for room under backpressure.
    /// Returns `false` if the subscription closed before the event could be queued.
    async fn push(&self, event: E) -> bool {
        loop {
            // Registered before the check so a concurrent close or pop is not missed.
            let writable = self.writable.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return false;
                }
                if state.buffer.len() < self.capacity {
                    state.buffer.push_back(event);
                    drop(state);
                    self.readable.notify_one();
                    return true;
                }
                if self.policy == OverflowPolicy::DropOldest {
                    state.buffer.pop_front();
                    state.lagged += 1;
                    state.buffer.push_back(event);
                    drop(state);
                    self.readable.notify_one();
                    return true;
                }
            }
            writable.await;
        }
    }

    fn take(&self) -> Option<Result<E, BusError>> {
        let mut state = self.lock();
        if state.lagged > 0 {
            let missed = std::mem::take(&mut state.lagged);
            return Some(Err(BusError::SubscriberLagged(missed)));
        }
        if let Some(event) = state.buffer.pop_front() {
            drop(state);
            self.writable.notify_one();
            return Some(Ok(event));
        }
        if state.closed {
            return Some(Err(BusError::Closed));
        }
        None
    }

    fn close(&self) {
        self.lock().closed = true;
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}

type Registry<E> = Vec<(SubscriptionId, Arc<SubscriberQueue<E>>)>;

struct BusShared<E> {
    config: BusConfig,
    subscribers: Mutex<Registry<E>>,
    next_id: AtomicU64,
    published: AtomicU64,
    closed: AtomicBool,
}

impl<E> BusShared<E> {
    fn registry(&self) -> MutexGuard<'_, Registry<E>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriptionId) -> Option<Arc<SubscriberQueue<E>>> {
        let mut registry = self.registry();
        let index = registry.iter().position(|(sub, _)| *sub == id)?;
        Some(registry.remove(index).1)
    }

    fn close_all(&self) {
        self.closed.store(true, Ordering::Release);
        let queues = std::mem::take(&mut *self.registry());
        for (_, queue) in queues {
            queue.close();
        }
    }
}

impl<E> Drop for BusShared<E> {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Publish/subscribe fan-out of `E` values.
///
/// Cheap to clone; all clones publish to the same subscriptions. Once every clone is
/// dropped (or [`close`](Self::close) is called), subscribers drain what is buffered and
/// then receive [`BusError::Closed`].
pub struct EventBus<E> {
    shared: Arc<BusShared<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<E> EventBus<E> {
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry().len()
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.shared.config)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<E: Clone + Send + Sync + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::unchecked(BusConfig::default())
    }
}

impl<E: Clone + Send + Sync + 'static> EventBus<E> {
    pub fn new(config: BusConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::unchecked(config))
    }

    pub(crate) fn unchecked(config: BusConfig) -> Self {
        Self {
            shared: Arc::new(BusShared {
                config,
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    /// Deliver `event` to every subscription registered right now.
    ///
    /// Subscriptions added while the publish is in progress do not see the event.
    /// Returns the number of subscriptions the event was queued for.
    pub async fn publish(&self, event: E) -> usize {
        let targets: Vec<_> = self
            .shared
            .registry()
            .iter()
            .map(|(id, queue)| (*id, queue.clone()))
            .collect();
        self.shared.published.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        for (id, queue) in targets {
            if queue.push(event.clone()).await {
                delivered += 1;
            } else {
                trace!(subscription = %id, "Subscription closed during publish");
            }
        }
        delivered
    }

    /// Register a subscription with the bus's default capacity.
    pub fn subscribe(&self) -> Subscription<E> {
        self.subscribe_with_capacity(self.shared.config.capacity)
    }

    /// Register a subscription with its own buffer size (at least 1).
    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription<E> {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let queue = Arc::new(SubscriberQueue::new(capacity.max(1), self.shared.config.policy));
        if self.shared.closed.load(Ordering::Acquire) {
            queue.close();
        } else {
            self.shared.registry().push((id, queue.clone()));
        }
        debug!(subscription = %id, capacity = queue.capacity, "Subscribed");
        Subscription {
            id,
            queue,
            bus: Arc::downgrade(&self.shared),
        }
    }

    /// Remove `subscription` from the fan-out set. Equivalent to dropping it.
    pub fn unsubscribe(&self, subscription: Subscription<E>) {
        drop(subscription)
    }

    /// Total number of publish calls so far.
    pub fn published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }

    /// Close every subscription. Later publishes reach nobody.
    pub fn close(&self) {
        self.shared.close_all();
    }
}

/// One listener's view of the bus.
pub struct Subscription<E> {
    id: SubscriptionId,
    queue: Arc<SubscriberQueue<E>>,
    bus: Weak<BusShared<E>>,
}

impl<E> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<E: Send + 'static> Subscription<E> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event.
    ///
    /// Yields `Err(SubscriberLagged(n))` once after `n` events were evicted, then the
    /// oldest event still buffered. Yields `Err(Closed)` when the bus is gone and the
    /// buffer is empty.
    pub async fn next_event(&mut self) -> Result<E, BusError> {
        loop {
            let readable = self.queue.readable.notified();
            if let Some(next) = self.queue.take() {
                return next;
            }
            readable.await;
        }
    }

    /// Like [`next_event`](Self::next_event) but returns `None` instead of waiting.
    pub fn try_next_event(&mut self) -> Option<Result<E, BusError>> {
        self.queue.take()
    }

    /// Number of events currently buffered.
    pub fn len(&self) -> usize {
        self.queue.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push delivery: spawn a task feeding every event (and lag notice) to `callback`
    /// until the bus closes.
    pub fn on_event<F>(mut self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(Result<E, BusError>) + Send + 'static,
    {
        tokio::spawn(async move {
            loop {
                match self.next_event().await {
                    Err(BusError::Closed) => break,
                    next => callback(next),
                }
            }
            debug!(subscription = %self.id, "Delivery task finished");
        })
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
        self.queue.close();
        debug!(subscription = %self.id, "Unsubscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bus(capacity: usize, policy: OverflowPolicy) -> EventBus<u32> {
        EventBus::new(BusConfig::default().with_capacity(capacity).with_policy(policy)).unwrap()
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("backpressure".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Backpressure);
        assert_eq!("Drop-Oldest".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::DropOldest);
        assert!("newest".parse::<OverflowPolicy>().is_err());
    }

    #[test]
    fn test_debug_shows_subscriber_count() {
        let bus = bus(4, OverflowPolicy::DropOldest);
        let _sub = bus.subscribe();

        let rendered = format!("{bus:?}");
        assert!(rendered.contains("subscribers: 1"), "{rendered}");
    }

    #[tokio::test]
    async fn test_each_subscription_sees_every_event_in_order() {
        let bus = bus(16, OverflowPolicy::Backpressure);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        for n in 0..10 {
            assert_eq!(bus.publish(n).await, 2);
        }

        for n in 0..10 {
            assert_eq!(first.next_event().await, Ok(n));
        }
        for n in 0..10 {
            assert_eq!(second.next_event().await, Ok(n));
        }
        assert!(first.try_next_event().is_none());
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = bus(4, OverflowPolicy::Backpressure);
        assert_eq!(bus.publish(1).await, 0);

        let mut sub = bus.subscribe();
        bus.publish(2).await;
        assert_eq!(sub.next_event().await, Ok(2));
    }

    #[tokio::test]
    async fn test_drop_oldest_reports_lag_then_next_event() {
        let bus = bus(1, OverflowPolicy::DropOldest);
        let mut sub = bus.subscribe();

        bus.publish(1).await;
        bus.publish(2).await;

        assert_eq!(sub.next_event().await, Err(BusError::SubscriberLagged(1)));
        assert_eq!(sub.next_event().await, Ok(2));
    }

    #[tokio::test]
    async fn test_lag_is_reported_only_to_lagging_subscriber() {
        let bus = bus(1, OverflowPolicy::DropOldest);
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe_with_capacity(8);

        bus.publish(1).await;
        bus.publish(2).await;
        bus.publish(3).await;

        assert_eq!(fast.next_event().await, Ok(1));
        assert_eq!(fast.next_event().await, Ok(2));
        assert_eq!(fast.next_event().await, Ok(3));
        assert_eq!(slow.next_event().await, Err(BusError::SubscriberLagged(2)));
        assert_eq!(slow.next_event().await, Ok(3));
    }

    #[tokio::test]
    async fn test_backpressure_blocks_publisher_until_drained() {
        let bus = bus(1, OverflowPolicy::Backpressure);
        let mut sub = bus.subscribe();
        bus.publish(1).await;

        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!publisher.is_finished());

        assert_eq!(sub.next_event().await, Ok(1));
        assert_eq!(publisher.await.unwrap(), 1);
        assert_eq!(sub.next_event().await, Ok(2));
    }

    #[tokio::test]
    async fn test_dropped_subscription_releases_blocked_publisher() {
        let bus = bus(1, OverflowPolicy::Backpressure);
        let stalled = bus.subscribe();
        let mut healthy = bus.subscribe_with_capacity(4);
        bus.publish(1).await;

        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!publisher.is_finished());

        bus.unsubscribe(stalled);
        assert_eq!(publisher.await.unwrap(), 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(healthy.next_event().await, Ok(1));
        assert_eq!(healthy.next_event().await, Ok(2));
    }

    #[tokio::test]
    async fn test_closed_after_bus_dropped_and_drained() {
        let bus = bus(4, OverflowPolicy::Backpressure);
        let mut sub = bus.subscribe();
        bus.publish(7).await;
        drop(bus);

        assert_eq!(sub.next_event().await, Ok(7));
        assert_eq!(sub.next_event().await, Err(BusError::Closed));
    }

    #[tokio::test]
    async fn test_on_event_pushes_until_closed() {
        let bus = bus(8, OverflowPolicy::Backpressure);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let task = bus.subscribe().on_event(move |next| {
            let _ = tx.send(next);
        });

        bus.publish(1).await;
        bus.publish(2).await;
        bus.close();
        task.await.unwrap();

        assert_eq!(rx.recv().await, Some(Ok(1)));
        assert_eq!(rx.recv().await, Some(Ok(2)));
        assert_eq!(rx.recv().await, None);
    }
}
