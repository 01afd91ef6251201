//! # SerialExecutor: one-at-a-time execution of submitted actions.
//!
//! The [`SerialExecutor`] owns an unbounded intake channel, a single worker
//! loop and an event bus. Any number of callers may submit concurrently; the
//! worker runs each accepted action to completion before starting the next.
//!
//! ## High-level architecture
//! ```text
//! submit(action) ─┐  (intake lock: id + send are atomic)
//! submit(action) ─┼──► [unbounded channel] ──► Worker::run() ──► job.await ──► Handle<T, E>
//! submit(action) ─┘                                 │
//!                                                   └──► Bus ──► listener ──► SubscriberSet
//!
//! shutdown():
//!   take intake sender ──► state = Draining ──► publish ShutdownRequested
//!   worker drains the channel ──► state = Stopped ──► DrainSignal resolves
//! ```
//!
//! ## Rules
//! - Acceptance order == id order == execution order == completion order.
//! - `submit` never blocks or suspends.
//! - After `shutdown()` every submission is rejected synchronously.
//! - Dropping the last executor handle closes the intake like `shutdown()`
//!   (the loop drains and stops, skipping `Draining`).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskline::{ExecutorConfig, ExecutorState, SerialExecutor};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let exec = SerialExecutor::new(ExecutorConfig::named("ledger"));
//!
//! let first = exec.submit(|| async {
//!     tokio::time::sleep(Duration::from_millis(10)).await;
//!     Ok::<_, std::io::Error>("first")
//! })?;
//! let second = exec.submit_sync(|| Ok::<_, std::io::Error>("second"))?;
//!
//! exec.shutdown().await;
//! assert_eq!(exec.state(), ExecutorState::Stopped);
//! assert_eq!(first.await?, "first");
//! assert_eq!(second.await?, "second");
//! assert!(exec.submit_sync(|| Ok::<_, std::io::Error>(())).is_err());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::ExecutorConfig;
use crate::error::{RuntimeError, SubmitError};
use crate::events::{Bus, Event, EventKind};
use crate::executor::item::WorkItem;
use crate::executor::worker::Worker;
use crate::executor::{DrainSignal, ExecutorState, Handle};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`SerialExecutor`] with optional subscribers.
pub struct SerialExecutorBuilder {
    cfg: ExecutorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SerialExecutorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ExecutorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive executor events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the executor and spawns its worker loop.
    ///
    /// Must be called within a tokio runtime. The executor starts in
    /// [`ExecutorState::Created`] and moves to `Running` once the loop is first scheduled.
    pub fn build(self) -> SerialExecutor {
        let name: Arc<str> = Arc::from(self.cfg.name.as_ref());
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let (tx, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ExecutorState::Created);
        let state = Arc::new(state);
        let pending = Arc::new(AtomicUsize::new(0));
        let done = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let set = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
            set.spawn_listener(bus.subscribe(), done.clone());
        }

        tokio::spawn(
            Worker {
                name: Arc::clone(&name),
                rx,
                state: Arc::clone(&state),
                pending: Arc::clone(&pending),
                bus: bus.clone(),
                done,
            }
            .run(),
        );

        SerialExecutor {
            inner: Arc::new(Inner {
                name,
                cfg: self.cfg,
                intake: Mutex::new(Intake {
                    tx: Some(tx),
                    next_id: 0,
                }),
                state,
                pending,
                bus,
            }),
        }
    }
}

/// Sender side of the intake; `None` once shutdown was requested.
struct Intake {
    tx: Option<mpsc::UnboundedSender<WorkItem>>,
    next_id: u64,
}

struct Inner {
    name: Arc<str>,
    cfg: ExecutorConfig,
    intake: Mutex<Intake>,
    state: Arc<watch::Sender<ExecutorState>>,
    pending: Arc<AtomicUsize>,
    bus: Bus,
}

/// Serialized single-worker executor ("active object").
///
/// Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct SerialExecutor {
    inner: Arc<Inner>,
}

impl SerialExecutor {
    /// Returns a builder for an executor with subscribers.
    pub fn builder(cfg: ExecutorConfig) -> SerialExecutorBuilder {
        SerialExecutorBuilder::new(cfg)
    }

    /// Builds an executor without subscribers. Must be called within a tokio runtime.
    pub fn new(cfg: ExecutorConfig) -> Self {
        SerialExecutorBuilder::new(cfg).build()
    }

    /// Submits an async action.
    ///
    /// Returns immediately with a [`Handle`] that resolves with the action's
    /// value or its [`ActionError`](crate::ActionError) carrying the action's own
    /// error. Fails synchronously with [`SubmitError::Rejected`] once the
    /// executor is draining or stopped.
    pub fn submit<F, Fut, T, E>(&self, action: F) -> Result<Handle<T, E>, SubmitError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + Sync + 'static,
    {
        let accepted = {
            let mut guard = self.lock_intake();
            let intake = &mut *guard;
            match intake.tx.as_ref() {
                // Worker is gone when the receiver is closed (runtime dropped it).
                Some(tx) if !tx.is_closed() => {
                    let id = intake.next_id + 1;
                    let (item, handle) = WorkItem::new(id, action);

                    // Published before the send so it precedes the worker's `ItemStarting`.
                    self.inner.pending.fetch_add(1, Ordering::AcqRel);
                    self.inner.bus.publish(
                        Event::new(EventKind::ItemAccepted)
                            .with_source(Arc::clone(&self.inner.name))
                            .with_item(id),
                    );
                    if tx.send(item).is_ok() {
                        intake.next_id = id;
                        Ok(handle)
                    } else {
                        // Runtime tore the worker down between the check and the send.
                        self.inner.pending.fetch_sub(1, Ordering::AcqRel);
                        Err(Some(id))
                    }
                }
                _ => Err(None),
            }
        };
        accepted.map_err(|id| self.reject(id))
    }

    /// Submits a synchronous action; it runs on the worker like any other item.
    pub fn submit_sync<F, T, E>(&self, action: F) -> Result<Handle<T, E>, SubmitError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + Sync + 'static,
    {
        self.submit(move || std::future::ready(action()))
    }

    /// Stops accepting work and returns a signal that resolves once everything
    /// accepted before this call has run and the loop has exited.
    ///
    /// Idempotent: later calls return an equivalent signal.
    pub fn shutdown(&self) -> DrainSignal {
        let mut intake = self.lock_intake();
        if let Some(tx) = intake.tx.take() {
            // State moves before the sender drops so the loop cannot reach
            // `Stopped` first and have it overwritten.
            self.inner.state.send_if_modified(|s| {
                if s.is_accepting() {
                    *s = ExecutorState::Draining;
                    true
                } else {
                    false
                }
            });
            self.inner.bus.publish(
                Event::new(EventKind::ShutdownRequested).with_source(Arc::clone(&self.inner.name)),
            );
            tracing::debug!(executor = %self.inner.name, "shutdown requested");
            drop(tx);
        }
        drop(intake);

        DrainSignal::new(self.inner.state.subscribe(), Arc::clone(&self.inner.pending))
    }

    /// Shuts down and waits for the drain, bounded by [`ExecutorConfig::grace`].
    ///
    /// Returns [`RuntimeError::GraceExceeded`] if the grace runs out; queued
    /// actions are not cancelled and keep running afterwards.
    pub async fn shutdown_and_wait(&self) -> Result<(), RuntimeError> {
        let drain = self.shutdown();
        let Some(grace) = self.inner.cfg.grace_limit() else {
            drain.wait().await;
            return Ok(());
        };

        let res = drain.wait_timeout(grace).await;
        if let Err(RuntimeError::GraceExceeded { pending, .. }) = &res {
            tracing::warn!(executor = %self.inner.name, ?grace, pending, "drain exceeded grace");
            self.inner.bus.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_source(Arc::clone(&self.inner.name))
                    .with_grace(grace),
            );
        }
        res
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExecutorState {
        *self.inner.state.borrow()
    }

    /// Accepted items not yet finished (diagnostic snapshot).
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Executor name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Creates a receiver for subsequent executor events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    fn lock_intake(&self) -> MutexGuard<'_, Intake> {
        // Nothing panics while the lock is held; recover rather than propagate poison.
        self.inner
            .intake
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// `accepted` is the id already announced by `ItemAccepted`, if any.
    fn reject(&self, accepted: Option<u64>) -> SubmitError {
        let state = self.state();
        let mut ev = Event::new(EventKind::SubmissionRejected)
            .with_source(Arc::clone(&self.inner.name))
            .with_reason(state.as_label());
        if let Some(id) = accepted {
            ev = ev.with_item(id);
        }
        self.inner.bus.publish(ev);
        SubmitError::Rejected {
            executor: Arc::clone(&self.inner.name),
            state,
        }
    }
}

impl fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    fn exec(name: &'static str) -> SerialExecutor {
        SerialExecutor::new(ExecutorConfig::named(name))
    }

    #[tokio::test]
    async fn test_created_then_running() {
        let exec = exec("lifecycle");
        // The worker has not been scheduled yet on a current-thread runtime.
        assert_eq!(exec.state(), ExecutorState::Created);

        let h = exec.submit_sync(|| Ok::<_, &str>(1)).expect("accepted in Created");
        assert_eq!(h.await, Ok(1));
        assert_eq!(exec.state(), ExecutorState::Running);
        assert_eq!(exec.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_completion_order_equals_acceptance_order() {
        let exec = exec("fifo");
        let completed = Arc::new(Mutex::new(Vec::new()));

        let mut producers = Vec::new();
        for p in 0..8usize {
            let exec = exec.clone();
            let completed = completed.clone();
            producers.push(tokio::spawn(async move {
                let mut accepted = Vec::new();
                for i in 0..50usize {
                    let completed = completed.clone();
                    let h = exec
                        .submit(move || async move {
                            tokio::task::yield_now().await;
                            completed.lock().unwrap().push((p, i));
                            Ok::<_, &str>(())
                        })
                        .expect("accepted");
                    accepted.push(((p, i), h.id()));
                    drop(h);
                }
                accepted
            }));
        }

        let mut ids = HashMap::new();
        for producer in producers {
            for (key, id) in producer.await.unwrap() {
                ids.insert(key, id);
            }
        }
        exec.shutdown().await;

        let completed = completed.lock().unwrap();
        assert_eq!(completed.len(), 400);
        let order: Vec<u64> = completed.iter().map(|k| ids[k]).collect();
        let expected: Vec<u64> = (1..=400).collect();
        assert_eq!(order, expected);

        // Per producer, acceptance follows program order.
        for p in 0..8usize {
            let mine: Vec<u64> = (0..50usize).map(|i| ids[&(p, i)]).collect();
            assert!(mine.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_actions_never_overlap() {
        let exec = exec("exclusive");
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let exec = exec.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let mut hs = Vec::new();
                for _ in 0..10 {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    hs.push(
                        exec.submit(move || async move {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            // Suspend mid-action: the next action must still wait.
                            tokio::time::sleep(Duration::from_millis(1)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok::<_, &str>(())
                        })
                        .expect("accepted"),
                    );
                }
                for h in hs {
                    h.await.expect("action ok");
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_rejects_later_submissions() {
        let exec = exec("drain");
        let done = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..5u32 {
            let done = done.clone();
            handles.push(
                exec.submit(move || async move {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, &str>(i)
                })
                .unwrap(),
            );
        }

        let drain = exec.shutdown();
        assert_eq!(exec.state(), ExecutorState::Draining);

        let sixth = exec.submit_sync(|| Ok::<_, &str>(99));
        match sixth {
            Err(SubmitError::Rejected { executor, state }) => {
                assert_eq!(&*executor, "drain");
                assert!(!state.is_accepting());
            }
            Ok(_) => panic!("submission after shutdown must be rejected"),
        }

        drain.await;
        assert_eq!(exec.state(), ExecutorState::Stopped);
        assert_eq!(done.load(Ordering::SeqCst), 5);
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.await, Ok(i as u32));
        }
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_handle() {
        let exec = exec("isolation");
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        let first = exec
            .submit_sync(move || {
                l.lock().unwrap().push(1);
                Ok::<_, String>("one")
            })
            .unwrap();
        let l = log.clone();
        let second = exec
            .submit_sync(move || {
                l.lock().unwrap().push(2);
                Err::<&str, _>("second failed".to_string())
            })
            .unwrap();
        let l = log.clone();
        let third = exec
            .submit_sync(move || {
                l.lock().unwrap().push(3);
                Ok::<_, String>("three")
            })
            .unwrap();

        assert_eq!(first.await, Ok("one"));
        assert_eq!(
            second.await,
            Err(ActionError::failed("second failed".to_string()))
        );
        assert_eq!(third.await, Ok("three"));
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_panic_does_not_stop_worker() {
        let exec = exec("panics");
        let boom = exec
            .submit(|| async {
                if true {
                    panic!("action exploded");
                }
                Ok::<u8, &str>(0)
            })
            .unwrap();
        let after = exec.submit_sync(|| Ok::<_, &str>(7u8)).unwrap();

        assert_eq!(
            boom.await,
            Err(ActionError::Panicked {
                message: "action exploded".into()
            })
        );
        assert_eq!(after.await, Ok(7));
        assert_eq!(exec.state(), ExecutorState::Running);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let exec = exec("twice");
        let h = exec.submit_sync(|| Ok::<_, &str>(())).unwrap();

        let a = exec.shutdown();
        let b = exec.shutdown();
        a.clone().await;
        b.clone().await;

        assert!(a.is_drained());
        assert!(b.is_drained());
        assert_eq!(h.await, Ok(()));

        // Shutdown after stop is still fine and already drained.
        let c = exec.shutdown();
        assert!(c.is_drained());
        c.await;
    }

    #[tokio::test]
    async fn test_grace_exceeded_reports_pending() {
        let exec = SerialExecutor::new(ExecutorConfig {
            grace: Duration::from_millis(10),
            ..ExecutorConfig::named("slow")
        });
        let mut events = exec.events();
        let slow = exec
            .submit(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, &str>("late")
            })
            .unwrap();

        match exec.shutdown_and_wait().await {
            Err(RuntimeError::GraceExceeded { grace, pending }) => {
                assert_eq!(grace, Duration::from_millis(10));
                assert_eq!(pending, 1);
            }
            other => panic!("expected grace exceeded, got {other:?}"),
        }

        // The action was not cancelled.
        assert_eq!(slow.await, Ok("late"));
        exec.shutdown().await;

        let mut saw_grace = false;
        while let Ok(ev) = events.try_recv() {
            saw_grace |= ev.kind == EventKind::GraceExceeded;
        }
        assert!(saw_grace);
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle_order() {
        let exec = exec("events");
        let mut rx = exec.events();

        let ok = exec.submit_sync(|| Ok::<_, &str>(())).unwrap();
        let bad = exec.submit_sync(|| Err::<(), _>("nope")).unwrap();
        let _ = exec.submit_sync(|| Ok::<_, &str>(()));
        exec.shutdown();
        assert!(exec.submit_sync(|| Ok::<_, &str>(())).is_err());
        let _ = ok.await;
        let _ = bad.await;

        let mut kinds = Vec::new();
        loop {
            let ev = rx.recv().await.expect("event");
            kinds.push((ev.kind, ev.item));
            if ev.kind == EventKind::ExecutorStopped {
                break;
            }
        }
        assert_eq!(
            kinds,
            vec![
                (EventKind::ItemAccepted, Some(1)),
                (EventKind::ItemAccepted, Some(2)),
                (EventKind::ItemAccepted, Some(3)),
                (EventKind::ShutdownRequested, None),
                (EventKind::SubmissionRejected, None),
                (EventKind::ExecutorStarted, None),
                (EventKind::ItemStarting, Some(1)),
                (EventKind::ItemCompleted, Some(1)),
                (EventKind::ItemStarting, Some(2)),
                (EventKind::ItemFailed, Some(2)),
                (EventKind::ItemStarting, Some(3)),
                (EventKind::ItemCompleted, Some(3)),
                (EventKind::ExecutorStopped, None),
            ]
        );
    }

    #[tokio::test]
    async fn test_dropping_last_handle_stops_worker() {
        let exec = exec("dropped");
        let mut rx = exec.events();
        let h = exec.submit_sync(|| Ok::<_, &str>(5)).unwrap();
        drop(exec);

        assert_eq!(h.await, Ok(5));
        loop {
            let ev = rx.recv().await.expect("event");
            if ev.kind == EventKind::ExecutorStopped {
                break;
            }
        }
    }

    struct CompletedCounter(AtomicUsize);

    #[async_trait]
    impl Subscribe for CompletedCounter {
        async fn on_event(&self, event: &Event) {
            if event.kind == EventKind::ItemCompleted {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn name(&self) -> &'static str {
            "completed"
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let counter = Arc::new(CompletedCounter(AtomicUsize::new(0)));
        let exec = SerialExecutor::builder(ExecutorConfig::named("observed"))
            .with_subscribers(vec![counter.clone() as Arc<dyn Subscribe>])
            .build();

        for _ in 0..3 {
            let _ = exec.submit_sync(|| Ok::<_, &str>(()));
        }
        exec.shutdown().await;

        for _ in 0..1000 {
            if counter.0.load(Ordering::SeqCst) == 3 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_handle_returns_typed_error() {
        let exec = exec("typed");
        let h = exec
            .submit(|| async {
                Err::<(), _>(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "ledger.db missing",
                ))
            })
            .unwrap();

        match h.await {
            Err(ActionError::Failed { error }) => {
                assert_eq!(error.kind(), std::io::ErrorKind::NotFound);
                assert_eq!(error.to_string(), "ledger.db missing");
            }
            other => panic!("expected typed failure, got {other:?}"),
        }
    }

    #[test]
    fn test_submit_after_runtime_drop_is_not_announced() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let exec = rt.block_on(async { exec("orphan") });
        let mut rx = exec.events();
        // Dropping the runtime drops the never-polled worker and its receiver.
        drop(rt);

        let err = exec.submit_sync(|| Ok::<_, &str>(())).unwrap_err();
        assert!(matches!(err, SubmitError::Rejected { .. }));
        assert_eq!(exec.pending(), 0);

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push((ev.kind, ev.item));
        }
        assert_eq!(kinds, vec![(EventKind::SubmissionRejected, None)]);
    }

    struct AlwaysPanics;

    #[async_trait]
    impl Subscribe for AlwaysPanics {
        async fn on_event(&self, _event: &Event) {
            panic!("broken subscriber");
        }

        fn name(&self) -> &'static str {
            "always-panics"
        }
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_reported_once_per_event() {
        let exec = SerialExecutor::builder(ExecutorConfig::named("noisy"))
            .with_subscribers(vec![Arc::new(AlwaysPanics) as Arc<dyn Subscribe>])
            .build();
        let mut rx = exec.events();

        exec.submit_sync(|| Ok::<_, &str>(())).unwrap().await.unwrap();
        // Keep the executor alive so the subscriber machinery has time to run.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut panics = 0;
        let mut completed = 0;
        while let Ok(ev) = rx.try_recv() {
            match ev.kind {
                EventKind::SubscriberPanicked => panics += 1,
                EventKind::ItemCompleted => completed += 1,
                _ => {}
            }
        }
        // ItemAccepted, ExecutorStarted, ItemStarting, ItemCompleted.
        assert_eq!(panics, 4);
        assert_eq!(completed, 1);
        assert_eq!(exec.state(), ExecutorState::Running);
    }
}
