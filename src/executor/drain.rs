use std::future::IntoFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::error::RuntimeError;
use crate::executor::ExecutorState;

/// Resolves once the executor has drained and stopped.
///
/// Returned by [`SerialExecutor::shutdown`](crate::SerialExecutor::shutdown).
/// Every call returns an equivalent signal; clones observe the same state.
#[derive(Clone, Debug)]
pub struct DrainSignal {
    state: watch::Receiver<ExecutorState>,
    pending: Arc<AtomicUsize>,
}

impl DrainSignal {
    pub(crate) fn new(state: watch::Receiver<ExecutorState>, pending: Arc<AtomicUsize>) -> Self {
        Self { state, pending }
    }

    /// True if the executor has reached `Stopped`.
    pub fn is_drained(&self) -> bool {
        self.state.borrow().is_stopped()
    }

    /// Waits until the executor reaches `Stopped`.
    ///
    /// Also returns if the executor state was dropped entirely (nothing left to drain).
    pub async fn wait(mut self) {
        let _ = self.state.wait_for(|s| s.is_stopped()).await;
    }

    /// Waits at most `grace` for the drain.
    ///
    /// Actions keep running after the grace expires; only the wait is abandoned.
    pub async fn wait_timeout(self, grace: Duration) -> Result<(), RuntimeError> {
        let pending = Arc::clone(&self.pending);
        match tokio::time::timeout(grace, self.wait()).await {
            Ok(()) => Ok(()),
            Err(_elapsed) => Err(RuntimeError::GraceExceeded {
                grace,
                pending: pending.load(Ordering::Acquire),
            }),
        }
    }
}

impl IntoFuture for DrainSignal {
    type Output = ();
    type IntoFuture = BoxFuture<'static, ()>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}
