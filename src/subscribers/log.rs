//! # Logging subscriber for debugging and demos.
//!
//! [`LogWriter`] renders events through `tracing` in a compact key=value form.
//!
//! ## Output format
//! ```text
//! INFO  [started] source=ledger
//! DEBUG [accepted] source=ledger item=1
//! DEBUG [starting] source=ledger item=1 waited_ms=0
//! INFO  [completed] source=ledger item=1
//! WARN  [failed] source=ledger item=2 err="action failed: boom"
//! INFO  [shutdown-requested] source=ledger
//! INFO  [stopped] source=ledger
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs every event through `tracing`.
///
/// Enabled via the `logging` feature. Install a `tracing` subscriber
/// (e.g. `tracing_subscriber::fmt`) to see the output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let source = e.source.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::ExecutorStarted => tracing::info!("[started] source={source}"),
            EventKind::ItemAccepted => {
                tracing::debug!("[accepted] source={source} item={:?}", e.item)
            }
            EventKind::SubmissionRejected => tracing::warn!(
                "[rejected] source={source} state={:?}",
                e.reason.as_deref()
            ),
            EventKind::ItemStarting => tracing::debug!(
                "[starting] source={source} item={:?} waited_ms={:?}",
                e.item,
                e.waited_ms
            ),
            EventKind::ItemCompleted => {
                tracing::info!("[completed] source={source} item={:?}", e.item)
            }
            EventKind::ItemFailed => tracing::warn!(
                "[failed] source={source} item={:?} err={:?}",
                e.item,
                e.reason.as_deref()
            ),
            EventKind::ShutdownRequested => {
                tracing::info!("[shutdown-requested] source={source}")
            }
            EventKind::ExecutorStopped => tracing::info!("[stopped] source={source}"),
            EventKind::GraceExceeded => tracing::warn!(
                "[grace-exceeded] source={source} grace_ms={:?}",
                e.grace_ms
            ),
            EventKind::WorkerStarted => {
                tracing::debug!("[worker-started] source={source} worker={:?}", e.worker)
            }
            EventKind::WorkerStopped => tracing::debug!(
                "[worker-stopped] source={source} worker={:?} reason={:?}",
                e.worker,
                e.reason.as_deref()
            ),
            EventKind::SubscriberOverflow => tracing::warn!(
                "[subscriber-overflow] subscriber={source} reason={:?}",
                e.reason.as_deref()
            ),
            EventKind::SubscriberPanicked => tracing::error!(
                "[subscriber-panicked] subscriber={source} info={:?}",
                e.reason.as_deref()
            ),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
