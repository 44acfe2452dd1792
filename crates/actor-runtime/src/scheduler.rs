//! # Deferred Task Scheduler
//!
//! A single coordinator task owns a min-heap of timers keyed by absolute fire time.
//! It sleeps until the earliest deadline (or until a new timer is inserted), pops every
//! due entry and spawns the corresponding callable onto the Tokio executor. User code
//! never runs on the coordinator itself, so one slow task cannot delay the others.
//!
//! ## Ordering
//!
//! Entries are ordered by `(fire_at, seq)` where `seq` is a monotonically increasing
//! insertion counter, so timers with identical deadlines fire in submission order.
//!
//! ## Periodic tasks
//!
//! A periodic task is re-armed at `previous_fire_at + period`, not at "now + period",
//! so execution jitter never accumulates into drift.
//!
//! ## Cancellation
//!
//! Cancelling removes the task from the registry; its heap entry is skipped lazily when
//! it reaches the top. A task that has already been popped for dispatch runs anyway.
//!
//! ```rust
//! use actor_runtime::Scheduler;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = Scheduler::start();
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!     scheduler
//!         .schedule_once(Duration::from_millis(10), move || async move {
//!             let _ = tx.send("fired");
//!         })
//!         .unwrap();
//!     assert_eq!(rx.await.unwrap(), "fired");
//! }
//! ```

use crate::error::SchedulerError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, Instrument};

/// Identity of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

type Job = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

/// A heap entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerEntry {
    fire_at: Instant,
    seq: u64,
    id: TaskId,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline, then earliest insertion)
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct TaskEntry {
    /// `None` while a periodic job is out being dispatched.
    job: Option<Job>,
    period: Option<Duration>,
}

#[derive(Default)]
struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    tasks: HashMap<TaskId, TaskEntry>,
    next_seq: u64,
    next_id: u64,
    shut_down: bool,
}

impl TimerQueue {
    fn push(&mut self, id: TaskId, fire_at: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimerEntry { fire_at, seq, id });
    }

    /// Earliest deadline among live tasks, discarding stale heap entries on the way.
    fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(entry) = self.heap.peek() {
            if self.tasks.contains_key(&entry.id) {
                return Some(entry.fire_at);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops every task due at `now`, in fire order.
    fn pop_due(&mut self, now: Instant) -> Vec<Due> {
        let mut due = Vec::new();
        while let Some(entry) = self.heap.peek().copied() {
            if entry.fire_at > now {
                break;
            }
            self.heap.pop();
            let Some(task) = self.tasks.get_mut(&entry.id) else {
                continue; // cancelled
            };
            let Some(job) = task.job.take() else {
                continue;
            };
            let period = task.period;
            if period.is_none() {
                self.tasks.remove(&entry.id);
            }
            due.push(Due {
                id: entry.id,
                fire_at: entry.fire_at,
                period,
                job,
            });
        }
        due
    }
}

struct Due {
    id: TaskId,
    fire_at: Instant,
    period: Option<Duration>,
    job: Job,
}

struct SchedulerShared {
    queue: Mutex<TimerQueue>,
    wake: Arc<Notify>,
}

impl SchedulerShared {
    fn queue(&self) -> MutexGuard<'_, TimerQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SchedulerShared {
    fn drop(&mut self) {
        // Let the coordinator observe that every handle is gone.
        self.wake.notify_one();
    }
}

/// Handle to a scheduled task.
///
/// Dropping the handle does *not* cancel the task.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    scheduler: Weak<SchedulerShared>,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Prevent any future firing. Returns `true` if the task was still pending.
    pub fn cancel(&self) -> bool {
        self.scheduler
            .upgrade()
            .map(|shared| Scheduler { shared }.cancel(self))
            .unwrap_or(false)
    }

    /// Whether the task can still fire.
    pub fn is_pending(&self) -> bool {
        self.scheduler
            .upgrade()
            .map(|shared| shared.queue().tasks.contains_key(&self.id))
            .unwrap_or(false)
    }
}

/// Cloneable handle to the scheduler.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler {
    /// Creates the scheduler and spawns its coordinator task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start() -> Self {
        let wake = Arc::new(Notify::new());
        let shared = Arc::new(SchedulerShared {
            queue: Mutex::new(TimerQueue::default()),
            wake: wake.clone(),
        });
        tokio::spawn(coordinate(Arc::downgrade(&shared), wake));
        info!("Scheduler started");
        Self { shared }
    }

    /// Run `task` once, no earlier than `delay` from now.
    pub fn schedule_once<F, Fut>(
        &self,
        delay: Duration,
        task: F,
    ) -> Result<TaskHandle, SchedulerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut task = Some(task);
        let job: Job = Box::new(move || match task.take() {
            Some(task) => task().boxed(),
            None => futures::future::ready(()).boxed(),
        });
        self.insert(Instant::now() + delay, None, job)
    }

    /// Run `task` every `period`, first at now + `period`.
    pub fn schedule_every<F, Fut>(
        &self,
        period: Duration,
        mut task: F,
    ) -> Result<TaskHandle, SchedulerError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let job: Job = Box::new(move || task().boxed());
        self.insert(Instant::now() + period, Some(period), job)
    }

    fn insert(
        &self,
        fire_at: Instant,
        period: Option<Duration>,
        job: Job,
    ) -> Result<TaskHandle, SchedulerError> {
        let id = {
            let mut queue = self.shared.queue();
            if queue.shut_down {
                return Err(SchedulerError::ShutDown);
            }
            let id = TaskId(queue.next_id);
            queue.next_id += 1;
            queue.tasks.insert(
                id,
                TaskEntry {
                    job: Some(job),
                    period,
                },
            );
            queue.push(id, fire_at);
            id
        };
        self.shared.wake.notify_one();
        debug!(task = %id, periodic = period.is_some(), "Scheduled");
        Ok(TaskHandle {
            id,
            scheduler: Arc::downgrade(&self.shared),
        })
    }

    /// Cancel a task. Returns `true` if it prevented a future firing; cancelling a
    /// task that already fired (or was already cancelled) is a no-op.
    pub fn cancel(&self, handle: &TaskHandle) -> bool {
        self.try_cancel(handle).is_ok()
    }

    /// Like [`cancel`](Self::cancel) but reports unknown or already-fired tasks.
    pub fn try_cancel(&self, handle: &TaskHandle) -> Result<(), SchedulerError> {
        let removed = self.shared.queue().tasks.remove(&handle.id);
        match removed {
            Some(_) => {
                debug!(task = %handle.id, "Cancelled");
                Ok(())
            }
            None => Err(SchedulerError::TaskNotFound(handle.id)),
        }
    }

    /// Number of tasks that can still fire.
    pub fn pending(&self) -> usize {
        self.shared.queue().tasks.len()
    }

    /// Drop every pending task and stop the coordinator. Later schedule calls fail
    /// with [`SchedulerError::ShutDown`].
    pub fn shutdown(&self) {
        let dropped = {
            let mut queue = self.shared.queue();
            queue.shut_down = true;
            queue.heap.clear();
            let dropped = queue.tasks.len();
            queue.tasks.clear();
            dropped
        };
        self.shared.wake.notify_one();
        info!(dropped, "Scheduler shut down");
    }
}

/// The coordinator loop. Holds only a weak reference while sleeping so it exits once
/// every scheduler handle has been dropped.
async fn coordinate(shared: Weak<SchedulerShared>, wake: Arc<Notify>) {
    loop {
        let Some(strong) = shared.upgrade() else {
            break;
        };

        let (due, next_deadline) = {
            let mut queue = strong.queue();
            if queue.shut_down {
                break;
            }
            let due = queue.pop_due(Instant::now());
            (due, queue.next_deadline())
        };

        let mut rearmed = false;
        for Due {
            id,
            fire_at,
            period,
            mut job,
        } in due
        {
            let span = tracing::debug_span!("scheduled", task = %id);
            tokio::spawn(job().instrument(span));

            if let Some(period) = period {
                let mut queue = strong.queue();
                // The entry disappears if the task was cancelled while dispatching.
                if let Some(task) = queue.tasks.get_mut(&id) {
                    task.job = Some(job);
                    queue.push(id, fire_at + period);
                    rearmed = true;
                }
            }
        }
        if rearmed {
            continue;
        }
        drop(strong);

        match next_deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = wake.notified() => {}
                }
            }
            None => wake.notified().await,
        }
    }
    debug!("Scheduler coordinator exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_no_earlier_than_delay() {
        let scheduler = Scheduler::start();
        let start = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler
            .schedule_once(Duration::from_millis(250), move || async move {
                let _ = tx.send(Instant::now());
            })
            .unwrap();

        let fired_at = rx.recv().await.unwrap();
        assert!(fired_at - start >= Duration::from_millis(250));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_deadline_prevents_firing() {
        let scheduler = Scheduler::start();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = scheduler
            .schedule_once(Duration::from_millis(100), move || async move {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.cancel());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(fired.load(AtomicOrdering::SeqCst), 0);
        // Second cancel is a no-op.
        assert!(!scheduler.cancel(&handle));
        assert_eq!(
            scheduler.try_cancel(&handle),
            Err(SchedulerError::TaskNotFound(handle.id()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_deadlines_fire_in_submission_order() {
        let scheduler = Scheduler::start();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for n in 0..5 {
            let tx = tx.clone();
            scheduler
                .schedule_once(Duration::from_millis(10), move || async move {
                    let _ = tx.send(n);
                })
                .unwrap();
        }
        drop(tx);

        let mut order = Vec::new();
        while let Some(n) = rx.recv().await {
            order.push(n);
        }
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_deadline_fires_first() {
        let scheduler = Scheduler::start();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for (label, delay) in [("late", 300), ("early", 100), ("middle", 200)] {
            let tx = tx.clone();
            scheduler
                .schedule_once(Duration::from_millis(delay), move || async move {
                    let _ = tx.send(label);
                })
                .unwrap();
        }
        drop(tx);

        let mut order = Vec::new();
        while let Some(label) = rx.recv().await {
            order.push(label);
        }
        assert_eq!(order, vec!["early", "middle", "late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_does_not_drift() {
        let scheduler = Scheduler::start();
        let start = Instant::now();
        let period = Duration::from_millis(100);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = scheduler
            .schedule_every(period, move || {
                let tx = tx.clone();
                async move {
                    // Slow work must not push later firings back.
                    let _ = tx.send(Instant::now());
                    tokio::time::sleep(Duration::from_millis(70)).await;
                }
            })
            .unwrap();

        for n in 1..=5u32 {
            let fired_at = rx.recv().await.unwrap();
            let expected = period * n;
            let elapsed = fired_at - start;
            assert!(elapsed >= expected, "firing {n} early: {elapsed:?}");
            assert!(elapsed < expected + period / 2, "firing {n} drifted: {elapsed:?}");
        }

        assert!(handle.cancel());
        assert!(!handle.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_periodic_stops_future_firings() {
        let scheduler = Scheduler::start();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = scheduler
            .schedule_every(Duration::from_millis(10), move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, AtomicOrdering::SeqCst);
                }
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.cancel();
        let seen = fired.load(AtomicOrdering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(seen, 3);
        assert_eq!(fired.load(AtomicOrdering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_tasks() {
        let scheduler = Scheduler::start();
        scheduler
            .schedule_once(Duration::from_secs(60), || async {})
            .unwrap();
        assert_eq!(scheduler.pending(), 1);

        scheduler.shutdown();

        assert_eq!(scheduler.pending(), 0);
        let result = scheduler.schedule_once(Duration::from_millis(1), || async {});
        assert!(matches!(result, Err(SchedulerError::ShutDown)));
    }
}
