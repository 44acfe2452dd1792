use actor_runtime::{
    handler_fn, ActorContext, ActorError, ActorSystem, BusConfig, BusError, Handled, Handler,
    OverflowPolicy, Pool, PoolConfig, PoolError, ResourceFactory, RuntimeConfig,
};
use async_trait::async_trait;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(1);

// --- Test Handlers ---

struct Recorder;

#[derive(Debug)]
enum RecorderMessage {
    Record(u32),
    Snapshot,
    /// Sleeps before replying
    Slow(Duration),
    Remind(u32, Duration),
    Fail,
}

#[derive(Debug, thiserror::Error)]
#[error("recorder asked to fail")]
struct RecorderError;

#[async_trait]
impl Handler for Recorder {
    type State = Vec<u32>;
    type Message = RecorderMessage;
    type Reply = Vec<u32>;
    type Error = RecorderError;
    type Context = ();

    async fn handle(
        &self,
        mut seen: Vec<u32>,
        message: RecorderMessage,
        ctx: &ActorContext<Self>,
    ) -> Handled<Self> {
        match message {
            RecorderMessage::Record(n) => {
                seen.push(n);
                Ok((seen, None))
            }
            RecorderMessage::Snapshot => {
                let snapshot = seen.clone();
                Ok((seen, Some(snapshot)))
            }
            RecorderMessage::Slow(delay) => {
                tokio::time::sleep(delay).await;
                let snapshot = seen.clone();
                Ok((seen, Some(snapshot)))
            }
            RecorderMessage::Remind(n, delay) => {
                ctx.send_after(delay, RecorderMessage::Record(n))
                    .expect("scheduler attached");
                Ok((seen, None))
            }
            RecorderMessage::Fail => Err(RecorderError),
        }
    }
}

struct Conn;

#[derive(Default)]
struct ConnFactory {
    created: Arc<AtomicUsize>,
}

#[async_trait]
impl ResourceFactory for ConnFactory {
    type Resource = Conn;
    type Error = Infallible;

    async fn create(&self) -> Result<Conn, Infallible> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Conn)
    }
}

fn system() -> ActorSystem {
    ActorSystem::new(RuntimeConfig::default()).unwrap()
}

// --- Tests ---

#[tokio::test]
async fn test_echo_actor_replies() {
    let system = system();
    let echo = system.spawn(handler_fn(|_: (), text: String| ((), Some(text))), ());

    let reply = echo.ask("hello".to_string(), TIMEOUT).await.unwrap();
    assert_eq!(reply, "hello");

    echo.stop().await.unwrap();
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_messages_from_one_sender_processed_in_order() {
    let system = system();
    let recorder = system.spawn(Recorder, Vec::new());

    for n in 0..100 {
        recorder.send(RecorderMessage::Record(n)).await.unwrap();
    }
    let seen = recorder.ask(RecorderMessage::Snapshot, TIMEOUT).await.unwrap();

    assert_eq!(seen, (0..100).collect::<Vec<_>>());
    drop(recorder);
    system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_ask_timeout_does_not_return_early() {
    let system = system();
    let recorder = system.spawn(Recorder, Vec::new());
    let start = Instant::now();

    let result = recorder
        .ask(RecorderMessage::Slow(Duration::from_secs(2)), Duration::from_millis(500))
        .await;

    assert_eq!(result, Err(ActorError::AskTimedOut(Duration::from_millis(500))));
    assert!(start.elapsed() >= Duration::from_millis(500));

    // The slow handler still runs to completion; the actor is unaffected.
    recorder.send(RecorderMessage::Record(1)).await.unwrap();
    let seen = recorder.ask(RecorderMessage::Snapshot, Duration::from_secs(5)).await.unwrap();
    assert_eq!(seen, vec![1]);
    drop(recorder);
    system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_ask_without_reply_times_out() {
    let system = system();
    let silent = system.spawn(handler_fn(|n: u32, _: u32| (n, None::<u32>)), 0);
    let start = Instant::now();

    let result = silent.ask(1, Duration::from_millis(500)).await;

    assert_eq!(result, Err(ActorError::AskTimedOut(Duration::from_millis(500))));
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert!(silent.is_alive());

    silent.stop().await.unwrap();
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ask_fails_fast_when_actor_dies_before_replying() {
    let system = system();
    let doomed = system.spawn(Recorder, Vec::new());

    doomed.send(RecorderMessage::Fail).await.unwrap();
    let result = doomed.ask(RecorderMessage::Snapshot, Duration::from_secs(60)).await;

    assert_eq!(result, Err(ActorError::AskChannelClosed));
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_try_send_reports_full_mailbox() {
    let system = system();
    let recorder = system.spawn_bounded(Recorder, Vec::new(), (), 1);

    // Park the actor inside a slow handler so the mailbox can fill up.
    let parked = {
        let recorder = recorder.clone();
        tokio::spawn(async move {
            recorder
                .ask(RecorderMessage::Slow(Duration::from_millis(100)), TIMEOUT)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    recorder.try_send(RecorderMessage::Record(1)).unwrap();
    assert_eq!(
        recorder.try_send(RecorderMessage::Record(2)),
        Err(ActorError::MailboxFull { capacity: 1 })
    );

    parked.await.unwrap().unwrap();
    drop(recorder);
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failing_actor_does_not_affect_others() {
    let system = system();
    let doomed = system.spawn(Recorder, Vec::new());
    let survivor = system.spawn(Recorder, Vec::new());

    doomed.send(RecorderMessage::Fail).await.unwrap();
    doomed.closed().await;
    assert!(!doomed.is_alive());
    assert_eq!(
        doomed.send(RecorderMessage::Record(1)).await,
        Err(ActorError::MailboxClosed)
    );

    survivor.send(RecorderMessage::Record(7)).await.unwrap();
    assert_eq!(
        survivor.ask(RecorderMessage::Snapshot, TIMEOUT).await.unwrap(),
        vec![7]
    );

    survivor.stop().await.unwrap();
    // A handler failure is logged, not a shutdown error.
    system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_send_after_delivers_to_self() {
    let system = system();
    let recorder = system.spawn(Recorder, Vec::new());

    recorder
        .send(RecorderMessage::Remind(9, Duration::from_secs(3)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(recorder.ask(RecorderMessage::Snapshot, TIMEOUT).await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(recorder.ask(RecorderMessage::Snapshot, TIMEOUT).await.unwrap(), vec![9]);

    drop(recorder);
    system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_pool_third_acquirer_waits_for_release() {
    let factory = ConnFactory::default();
    let created = factory.created.clone();
    let pool = Pool::new(factory, PoolConfig::default().with_max_size(2)).unwrap();

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    let third = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|token| token.slot_id()) })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!third.is_finished());
    assert_eq!(pool.stats().checked_out, 2);

    let released = first.slot_id();
    first.release();
    assert_eq!(third.await.unwrap().unwrap(), released);
    assert_eq!(created.load(Ordering::SeqCst), 2);

    drop(second);
}

#[tokio::test(start_paused = true)]
async fn test_pool_waiter_times_out() {
    let system = ActorSystem::new(
        RuntimeConfig::default().with_pool(
            PoolConfig::default()
                .with_max_size(1)
                .with_acquire_timeout(Some(Duration::from_secs(2))),
        ),
    )
    .unwrap();
    let pool = system.pool(ConnFactory::default()).unwrap();

    let _held = pool.acquire().await.unwrap();
    let result = pool.acquire().await;

    assert!(matches!(result, Err(PoolError::AcquireTimedOut(d)) if d == Duration::from_secs(2)));
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pool_never_exceeds_max_size_under_contention() {
    let pool = Pool::new(ConnFactory::default(), PoolConfig::default().with_max_size(3)).unwrap();
    let in_use = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..20)
        .map(|_| {
            let (pool, in_use, peak) = (pool.clone(), in_use.clone(), peak.clone());
            tokio::spawn(async move {
                for _ in 0..5 {
                    let token = pool.acquire().await.unwrap();
                    let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    in_use.fetch_sub(1, Ordering::SeqCst);
                    drop(token);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    let stats = pool.stats();
    assert_eq!(stats.checked_out, 0);
    assert_eq!(stats.total_acquired, 100);
    assert!(stats.total_created <= 3);
}

#[tokio::test]
async fn test_bus_from_system_config() {
    let system = ActorSystem::new(RuntimeConfig::default().with_bus(
        BusConfig::default()
            .with_capacity(1)
            .with_policy(OverflowPolicy::DropOldest),
    ))
    .unwrap();
    let bus = system.event_bus::<&'static str>();
    let mut sub = bus.subscribe();

    bus.publish("first").await;
    bus.publish("second").await;

    assert_eq!(sub.next_event().await, Err(BusError::SubscriberLagged(1)));
    assert_eq!(sub.next_event().await, Ok("second"));
    system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_periodic_work_feeds_actor() {
    let system = system();
    let recorder = system.spawn(Recorder, Vec::new());
    let ticks = Arc::new(AtomicUsize::new(0));

    let weak = recorder.downgrade();
    let counter = ticks.clone();
    system
        .scheduler()
        .schedule_every(Duration::from_secs(10), move || {
            let weak = weak.clone();
            let n = counter.fetch_add(1, Ordering::SeqCst) as u32;
            async move {
                if let Some(recorder) = weak.upgrade() {
                    let _ = recorder.send(RecorderMessage::Record(n)).await;
                }
            }
        })
        .unwrap();

    tokio::time::sleep(Duration::from_secs(35)).await;
    let seen = recorder.ask(RecorderMessage::Snapshot, TIMEOUT).await.unwrap();
    assert_eq!(seen, vec![0, 1, 2]);

    drop(recorder);
    system.shutdown().await.unwrap();
}
