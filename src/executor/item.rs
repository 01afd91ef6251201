//! # Unit of deferred work.
//!
//! A [`WorkItem`] erases the caller's closure and result type into a boxed
//! job. The job owns the sending half of a `oneshot`; it runs the action,
//! captures failure or panic as a value and fulfils the signal. Only the
//! worker loop polls jobs, so the signal is always written from there.
//!
//! ```text
//! submit(action) ──► WorkItem { id, enqueued_at, job } ──► channel ──► worker
//!        │                                                          │
//!        └──► Handle<T, E> (oneshot::Receiver) ◄──── tx.send(result) ◄─┘
//! ```

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::{ActionError, panic_message};
use crate::executor::Handle;

/// Type-erased job: runs the action and fulfils its handle.
///
/// The job resolves with the rendered failure, for event reporting only.
pub(crate) type Job = BoxFuture<'static, Result<(), String>>;

/// One accepted submission, owned by the executor until it runs.
pub(crate) struct WorkItem {
    /// Acceptance sequence number (1-based).
    pub id: u64,
    /// Acceptance time, for wait-time diagnostics.
    pub enqueued_at: Instant,
    /// Deferred action plus its completion signal.
    pub job: Job,
}

impl WorkItem {
    /// Wraps `action` into an item and returns the matching handle.
    ///
    /// Nothing of `action` runs here: the closure is called on first poll of the job.
    pub fn new<F, Fut, T, E>(id: u64, action: F) -> (Self, Handle<T, E>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel::<Result<T, ActionError<E>>>();

        let job = async move {
            // Calling the closure happens inside the guarded future, so a panic
            // in its synchronous prefix is caught too.
            let guarded = AssertUnwindSafe(async move { action().await }).catch_unwind();
            let res = match guarded.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(ActionError::failed(e)),
                Err(panic) => Err(ActionError::Panicked {
                    message: panic_message(panic.as_ref()),
                }),
            };
            let report = match &res {
                Ok(_) => Ok(()),
                Err(e) => Err(e.to_string()),
            };
            // Receiver gone means the caller dropped its handle; the work still counts as done.
            let _ = tx.send(res);
            report
        }
        .boxed();

        let item = Self {
            id,
            enqueued_at: Instant::now(),
            job,
        };
        (item, Handle::new(id, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_action_is_deferred_until_job_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let (item, handle) = WorkItem::new(1, move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, &str>(5)
        });
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(item.id, 1);

        assert_eq!(item.job.await, Ok(()));
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(handle.await, Ok(5));
    }

    #[tokio::test]
    async fn test_failure_and_panic_become_values() {
        let (item, handle) = WorkItem::new(2, || async { Err::<u8, _>("boom") });
        let report = item.job.await;
        assert_eq!(report, Err("action failed: boom".to_string()));
        assert_eq!(handle.await, Err(ActionError::failed("boom")));

        let (item, handle) = WorkItem::new(3, || -> futures::future::Ready<Result<u8, &'static str>> {
            panic!("sync prefix")
        });
        assert_eq!(item.job.await, Err("action panicked: sync prefix".to_string()));
        assert_eq!(
            handle.await,
            Err(ActionError::Panicked {
                message: "sync prefix".into()
            })
        );
    }

    #[tokio::test]
    async fn test_dropped_item_abandons_handle() {
        let (item, handle) = WorkItem::new(4, || async { Ok::<_, &str>(()) });
        drop(item);
        assert_eq!(handle.await, Err(ActionError::Abandoned));
    }
}
