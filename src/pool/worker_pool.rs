//! # WorkerPool: N consumers draining one bounded queue.
//!
//! The [`WorkerPool`] is the consuming side of a [`BoundedWorkQueue`]:
//! producers keep calling `try_enqueue` on the shared queue, and each pool
//! consumer loops on `dequeue`, handing items to a [`Consume`] implementation.
//!
//! ## Architecture
//! ```text
//! producers ── try_enqueue ──► [BoundedWorkQueue] ──► consumer 0 ──► consume(item, ctx)
//!                                       │         ──► consumer 1 ──► consume(item, ctx)
//!                                       │         ──► consumer N ──► consume(item, ctx)
//!                                       │                  │
//!                                       │                  └──► Bus ──► listener ──► SubscriberSet
//! shutdown():
//!   queue.close() ──► consumers drain the rest ──► Dequeue::Closed ──► exit
//!        └─ grace exceeded ──► token.cancel() ──► abort consumers
//!                                  ──► ItemFailed{aborted} / WorkerStopped{aborted} ──► GraceExceeded
//! ```
//!
//! ## Rules
//! - Handler errors and panics are reported (events + `tracing`), never fatal to a consumer.
//! - Items are taken in FIFO order; with more than one consumer they may finish out of order.
//! - Dropping the pool cancels and aborts its consumers.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::error::{ActionError, RuntimeError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::pool::Consume;
use crate::queue::{BoundedWorkQueue, Dequeue};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Consumer tasks draining a shared [`BoundedWorkQueue`].
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use taskline::{BoundedWorkQueue, ConsumeFn, PoolConfig, WorkerPool};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let queue = Arc::new(BoundedWorkQueue::<String>::new(16));
/// let pool = WorkerPool::spawn(
///     PoolConfig { workers: 2, ..PoolConfig::named("mailer") },
///     queue.clone(),
///     ConsumeFn::arc("send", |to: String, _ctx: CancellationToken| async move {
///         println!("sending to {to}");
///         Ok::<_, std::io::Error>(())
///     }),
/// );
///
/// assert!(queue.try_enqueue("ada@example.com".to_string()));
/// pool.shutdown().await?;
/// assert!(queue.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool<T> {
    name: Arc<str>,
    cfg: PoolConfig,
    queue: Arc<BoundedWorkQueue<T>>,
    bus: Bus,
    set: JoinSet<()>,
    tracker: Arc<Tracker>,
    /// Cancels consumers and in-flight handlers.
    token: CancellationToken,
    /// Stops the subscriber listener.
    done: CancellationToken,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawns `cfg.workers` consumers over `queue`. Must be called within a tokio runtime.
    pub fn spawn(
        cfg: PoolConfig,
        queue: Arc<BoundedWorkQueue<T>>,
        consumer: Arc<dyn Consume<T>>,
    ) -> Self {
        Self::spawn_with_subscribers(cfg, queue, consumer, Vec::new())
    }

    /// Same as [`spawn`](Self::spawn), also forwarding pool events to `subscribers`.
    pub fn spawn_with_subscribers(
        cfg: PoolConfig,
        queue: Arc<BoundedWorkQueue<T>>,
        consumer: Arc<dyn Consume<T>>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let name: Arc<str> = Arc::from(cfg.name.as_ref());
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let token = CancellationToken::new();
        let done = CancellationToken::new();

        if !subscribers.is_empty() {
            let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
            subs.spawn_listener(bus.subscribe(), done.clone());
        }

        let seq = Arc::new(AtomicU64::new(0));
        let tracker = Arc::new(Tracker::default());
        let mut set = JoinSet::new();
        for idx in 0..cfg.workers_clamped() {
            let idx = idx as u32;
            tracker.lock().live.insert(idx);
            let consumer_loop = ConsumerLoop {
                idx,
                pool: Arc::clone(&name),
                queue: Arc::clone(&queue),
                consumer: Arc::clone(&consumer),
                bus: bus.clone(),
                seq: Arc::clone(&seq),
                tracker: Arc::clone(&tracker),
            };
            set.spawn(consumer_loop.run(token.clone()));
        }
        tracing::debug!(pool = %name, workers = cfg.workers_clamped(), "worker pool spawned");

        Self {
            name,
            cfg,
            queue,
            bus,
            set,
            tracker,
            token,
            done,
        }
    }

    /// Closes the queue and waits for the consumers to drain it.
    ///
    /// Waits at most [`PoolConfig::grace`] (`0s` = no limit). When the grace
    /// runs out, consumers are cancelled and aborted: each aborted item gets an
    /// `ItemFailed` event, each aborted consumer a `WorkerStopped`, and
    /// [`RuntimeError::GraceExceeded`] counts the aborted items plus those
    /// left in the queue.
    pub async fn shutdown(mut self) -> Result<(), RuntimeError> {
        self.queue.close();
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_source(Arc::clone(&self.name)));

        let Some(grace) = self.cfg.grace_limit() else {
            join_all(&mut self.set).await;
            return Ok(());
        };

        match tokio::time::timeout(grace, join_all(&mut self.set)).await {
            Ok(()) => Ok(()),
            Err(_elapsed) => {
                self.token.cancel();
                self.set.shutdown().await;
                let aborted = self.report_aborted();
                let pending = self.queue.len() + aborted;
                tracing::warn!(pool = %self.name, ?grace, pending, "pool drain exceeded grace");
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_source(Arc::clone(&self.name))
                        .with_grace(grace),
                );
                Err(RuntimeError::GraceExceeded { grace, pending })
            }
        }
    }

    /// Publishes failure events for work cut off by an abort; returns the
    /// number of aborted items.
    fn report_aborted(&self) -> usize {
        let (in_flight, live) = {
            let mut t = self.tracker.lock();
            (std::mem::take(&mut t.in_flight), std::mem::take(&mut t.live))
        };
        for (id, idx) in &in_flight {
            self.bus.publish(
                Event::new(EventKind::ItemFailed)
                    .with_source(Arc::clone(&self.name))
                    .with_worker(*idx)
                    .with_item(*id)
                    .with_reason("aborted"),
            );
        }
        for idx in live {
            self.bus.publish(
                Event::new(EventKind::WorkerStopped)
                    .with_source(Arc::clone(&self.name))
                    .with_worker(idx)
                    .with_reason("aborted"),
            );
        }
        in_flight.len()
    }

    /// Cancels consumers without draining: they exit at their next wait and
    /// in-flight handlers see their token cancelled.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The queue this pool drains.
    pub fn queue(&self) -> &Arc<BoundedWorkQueue<T>> {
        &self.queue
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of consumer tasks still running.
    pub fn workers(&self) -> usize {
        self.set.len()
    }

    /// Creates a receiver for subsequent pool events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.token.cancel();
        self.done.cancel();
    }
}

/// Waits until every consumer in the set has exited.
async fn join_all(set: &mut JoinSet<()>) {
    while set.join_next().await.is_some() {}
}

/// Work the consumers currently hold, for reporting after an abort.
#[derive(Default)]
struct Tracker {
    inner: Mutex<Tracked>,
}

#[derive(Default)]
struct Tracked {
    /// Item id -> consumer index.
    in_flight: BTreeMap<u64, u32>,
    /// Consumers that have not exited on their own.
    live: BTreeSet<u32>,
}

impl Tracker {
    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One consumer task.
struct ConsumerLoop<T: Send + 'static> {
    idx: u32,
    pool: Arc<str>,
    queue: Arc<BoundedWorkQueue<T>>,
    consumer: Arc<dyn Consume<T>>,
    bus: Bus,
    /// Pool-wide item counter (ids in dequeue order).
    seq: Arc<AtomicU64>,
    tracker: Arc<Tracker>,
}

impl<T: Send + 'static> ConsumerLoop<T> {
    async fn run(self, token: CancellationToken) {
        self.bus.publish(
            Event::new(EventKind::WorkerStarted)
                .with_source(Arc::clone(&self.pool))
                .with_worker(self.idx),
        );

        let reason = loop {
            if token.is_cancelled() {
                break "cancelled";
            }
            let item = match self.queue.dequeue(&token).await {
                Dequeue::Item(item) => item,
                Dequeue::Closed => break "closed",
                Dequeue::Cancelled => break "cancelled",
            };
            let id = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
            self.tracker.lock().in_flight.insert(id, self.idx);
            self.bus.publish(
                Event::new(EventKind::ItemStarting)
                    .with_source(Arc::clone(&self.pool))
                    .with_worker(self.idx)
                    .with_item(id),
            );

            let fut = self.consumer.consume(item, token.child_token());
            let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(res) => res,
                Err(panic) => Err(ActionError::Panicked {
                    message: panic_message(panic.as_ref()),
                }),
            };
            self.tracker.lock().in_flight.remove(&id);

            let ev = match outcome {
                Ok(()) => Event::new(EventKind::ItemCompleted),
                Err(e) => {
                    tracing::warn!(
                        pool = %self.pool,
                        consumer = self.consumer.name(),
                        item = id,
                        error = %e,
                        "consumer failed"
                    );
                    Event::new(EventKind::ItemFailed).with_reason(e.to_string())
                }
            };
            self.bus.publish(
                ev.with_source(Arc::clone(&self.pool))
                    .with_worker(self.idx)
                    .with_item(id),
            );
        };

        self.tracker.lock().live.remove(&self.idx);
        self.bus.publish(
            Event::new(EventKind::WorkerStopped)
                .with_source(Arc::clone(&self.pool))
                .with_worker(self.idx)
                .with_reason(reason),
        );
    }
}
