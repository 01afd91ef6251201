//! # Runtime events emitted by executors, pools and subscriber workers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Item events**: one unit of work moving through a component (accepted, starting, completed, failed)
//! - **Lifecycle events**: component start, shutdown request, drain completion
//! - **Subscriber events**: fan-out problems (overflow, panic)
//!
//! The [`Event`] struct carries metadata such as the emitting component
//! (`source`), the item id, failure reasons and queue wait time.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use taskline::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ItemFailed)
//!     .with_source("ledger")
//!     .with_item(3)
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::ItemFailed);
//! assert_eq!(ev.source.as_deref(), Some("ledger"));
//! assert_eq!(ev.item, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: "full" or "closed"
    SubscriberOverflow,

    // === Executor lifecycle ===
    /// Executor worker loop started (`Created → Running`).
    ///
    /// Sets:
    /// - `source`: executor name
    ExecutorStarted,

    /// `shutdown()` was called; intake closed (`→ Draining`).
    ///
    /// Sets:
    /// - `source`: executor or pool name
    ShutdownRequested,

    /// Worker loop exited after draining (`→ Stopped`).
    ///
    /// Sets:
    /// - `source`: executor name
    ExecutorStopped,

    /// Drain did not finish within the grace period.
    ///
    /// Sets:
    /// - `source`: executor or pool name
    /// - `grace_ms`: configured grace
    GraceExceeded,

    // === Item events ===
    /// Submission accepted and queued.
    ///
    /// Sets:
    /// - `source`: executor name
    /// - `item`: acceptance id
    ItemAccepted,

    /// Submission rejected (executor draining or stopped).
    ///
    /// Sets:
    /// - `source`: executor name
    /// - `reason`: observed state
    SubmissionRejected,

    /// Item taken off the queue; its action is about to run.
    ///
    /// Sets:
    /// - `source`: executor or pool name
    /// - `item`: item id
    /// - `waited_ms`: time spent queued
    ItemStarting,

    /// Action finished successfully.
    ///
    /// Sets:
    /// - `source`, `item`
    ItemCompleted,

    /// Action returned an error or panicked.
    ///
    /// Sets:
    /// - `source`, `item`
    /// - `reason`: rendered failure
    ItemFailed,

    // === Pool consumers ===
    /// Pool consumer task started.
    ///
    /// Sets:
    /// - `source`: pool name
    /// - `worker`: consumer index
    WorkerStarted,

    /// Pool consumer task exited (queue closed and drained, or cancelled).
    ///
    /// Sets:
    /// - `source`: pool name
    /// - `worker`: consumer index
    /// - `reason`: "closed" or "cancelled"
    WorkerStopped,
}

impl EventKind {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::ExecutorStarted => "executor_started",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::ExecutorStopped => "executor_stopped",
            EventKind::GraceExceeded => "grace_exceeded",
            EventKind::ItemAccepted => "item_accepted",
            EventKind::SubmissionRejected => "submission_rejected",
            EventKind::ItemStarting => "item_starting",
            EventKind::ItemCompleted => "item_completed",
            EventKind::ItemFailed => "item_failed",
            EventKind::WorkerStarted => "worker_started",
            EventKind::WorkerStopped => "worker_stopped",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the emitting executor, pool or subscriber.
    pub source: Option<Arc<str>>,
    /// Item id (acceptance order within the source).
    pub item: Option<u64>,
    /// Pool consumer index.
    pub worker: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Time the item spent queued, in milliseconds (compact).
    pub waited_ms: Option<u32>,
    /// Grace period in milliseconds (compact).
    pub grace_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            item: None,
            worker: None,
            reason: None,
            waited_ms: None,
            grace_ms: None,
        }
    }

    /// Attaches the emitting component name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches an item id.
    #[inline]
    pub fn with_item(mut self, id: u64) -> Self {
        self.item = Some(id);
        self
    }

    /// Attaches a pool consumer index.
    #[inline]
    pub fn with_worker(mut self, idx: u32) -> Self {
        self.worker = Some(idx);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the queue wait time (stored as milliseconds).
    #[inline]
    pub fn with_waited(mut self, d: Duration) -> Self {
        self.waited_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a grace duration (stored as milliseconds).
    #[inline]
    pub fn with_grace(mut self, d: Duration) -> Self {
        self.grace_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    /// True for reports produced by the subscriber machinery itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow
        )
    }

    /// True for events that describe a single item.
    #[inline]
    pub fn is_item_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ItemAccepted
                | EventKind::ItemStarting
                | EventKind::ItemCompleted
                | EventKind::ItemFailed
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::ItemAccepted);
        let b = Event::new(EventKind::ItemStarting);
        assert!(b.seq > a.seq);
        assert!(a.is_item_event());
    }

    #[test]
    fn test_durations_are_compacted() {
        let ev = Event::new(EventKind::GraceExceeded)
            .with_grace(Duration::from_secs(2))
            .with_waited(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.grace_ms, Some(2_000));
        assert_eq!(ev.waited_ms, Some(u32::MAX));
        assert!(!ev.is_item_event());
    }
}
