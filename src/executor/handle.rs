//! # Completion handle for a submitted action.
//!
//! [`Handle`] is the caller side of a write-once signal. Awaiting it yields the
//! action's value or its captured [`ActionError`]; failures never unwind
//! across the handoff.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::Shared;
use tokio::sync::oneshot;

use crate::error::ActionError;

/// Future resolving with the outcome of one submitted action.
///
/// `E` is the action's error type; a returned error comes back unchanged in
/// [`ActionError::Failed`]. Dropping a handle does not cancel the action; it still runs in order.
///
/// # Example
/// ```rust
/// use taskline::{ExecutorConfig, SerialExecutor};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let exec = SerialExecutor::new(ExecutorConfig::default());
///
/// let handle = exec.submit(|| async { Ok::<_, std::io::Error>(21 * 2) })?;
/// assert_eq!(handle.id(), 1);
/// assert_eq!(handle.await?, 42);
/// # Ok(())
/// # }
/// ```
#[must_use = "handles do nothing unless awaited; dropping one does not cancel the action"]
#[derive(Debug)]
pub struct Handle<T, E> {
    id: u64,
    rx: oneshot::Receiver<Result<T, ActionError<E>>>,
}

impl<T, E> Handle<T, E> {
    pub(crate) fn new(id: u64, rx: oneshot::Receiver<Result<T, ActionError<E>>>) -> Self {
        Self { id, rx }
    }

    /// Acceptance id of the item (1-based, increasing in acceptance order).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Converts the handle into a cloneable future for multiple readers.
    pub fn shared(self) -> Shared<Self>
    where
        T: Clone,
    {
        FutureExt::shared(self)
    }
}

impl<T, E> Future for Handle<T, E> {
    type Output = Result<T, ActionError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| match res {
            Ok(outcome) => outcome,
            Err(_closed) => Err(ActionError::Abandoned),
        })
    }
}
