//! # Worker loop: the single logical thread of an executor.
//!
//! Takes items off the intake channel and awaits each job to completion
//! before taking the next one.
//!
//! ## Event flow
//! For each item, the loop publishes:
//! ```text
//! ItemStarting → [action] → ItemCompleted (Ok)
//!                         → ItemFailed    (Err / panic)
//! ```
//!
//! ## Architecture
//! ```text
//! Created ──► Running
//! loop {
//!   ├─► recv() (suspends while empty)
//!   │     └─► None (intake closed + empty) ─► break
//!   ├─► publish ItemStarting (waited = now - enqueued_at)
//!   ├─► job.await                 (action N+1 never starts before N completes)
//!   ├─► pending -= 1
//!   └─► publish ItemCompleted / ItemFailed
//! }
//! ──► Stopped, publish ExecutorStopped
//! ```
//!
//! ## Rules
//! - Exactly one job is in flight at any time.
//! - Job failures are values; nothing a job does ends the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::executor::ExecutorState;
use crate::executor::item::WorkItem;

/// Everything the loop owns or shares with the executor handle.
pub(crate) struct Worker {
    pub name: Arc<str>,
    pub rx: mpsc::UnboundedReceiver<WorkItem>,
    pub state: Arc<watch::Sender<ExecutorState>>,
    pub pending: Arc<AtomicUsize>,
    pub bus: Bus,
    /// Cancelled after the final event so the subscriber listener can exit.
    pub done: CancellationToken,
}

impl Worker {
    /// Runs until the intake is closed and every queued item has run.
    pub async fn run(mut self) {
        self.state.send_if_modified(|s| {
            if *s == ExecutorState::Created {
                *s = ExecutorState::Running;
                true
            } else {
                false
            }
        });
        tracing::debug!(executor = %self.name, "worker loop started");
        self.bus
            .publish(Event::new(EventKind::ExecutorStarted).with_source(Arc::clone(&self.name)));

        while let Some(item) = self.rx.recv().await {
            let WorkItem {
                id,
                enqueued_at,
                job,
            } = item;

            self.bus.publish(
                Event::new(EventKind::ItemStarting)
                    .with_source(Arc::clone(&self.name))
                    .with_item(id)
                    .with_waited(enqueued_at.elapsed()),
            );

            let outcome = job.await;
            self.pending.fetch_sub(1, Ordering::AcqRel);

            match outcome {
                Ok(()) => self.bus.publish(
                    Event::new(EventKind::ItemCompleted)
                        .with_source(Arc::clone(&self.name))
                        .with_item(id),
                ),
                Err(e) => {
                    tracing::debug!(executor = %self.name, item = id, error = %e, "action failed");
                    self.bus.publish(
                        Event::new(EventKind::ItemFailed)
                            .with_source(Arc::clone(&self.name))
                            .with_item(id)
                            .with_reason(e),
                    );
                }
            }
        }

        self.state.send_replace(ExecutorState::Stopped);
        tracing::debug!(executor = %self.name, "worker loop stopped");
        self.bus
            .publish(Event::new(EventKind::ExecutorStopped).with_source(Arc::clone(&self.name)));
        self.done.cancel();
    }
}
