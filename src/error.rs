//! Error types used by the taskline runtime and submitted actions.
//!
//! This module defines the error enums surfaced by the crate:
//!
//! - [`SubmitError`]: raised synchronously by [`SerialExecutor::submit`](crate::SerialExecutor::submit).
//! - [`ActionError`]: delivered asynchronously through a [`Handle`](crate::Handle).
//! - [`TryEnqueueError`]: returned by [`BoundedWorkQueue::try_push`](crate::BoundedWorkQueue::try_push).
//! - [`RuntimeError`]: raised when a drain does not finish within its grace period.
//!
//! All of them provide `as_label` for logging, in the same snake_case style.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::executor::ExecutorState;

/// # Errors produced by the runtime itself.
///
/// These represent failures of the orchestration (shutdown/drain), never of
/// individual actions.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Drain did not complete within the grace period; `pending` items were still queued or running.
    #[error("drain timeout {grace:?} exceeded; pending: {pending}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of items not yet finished when the grace period ran out.
        pending: usize,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskline::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), pending: 3 };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Submission rejected by a [`SerialExecutor`](crate::SerialExecutor).
///
/// Raised synchronously to the caller of `submit`; no handle is produced.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum SubmitError {
    /// Executor no longer accepts work (`Draining` or `Stopped`).
    #[error("executor '{executor}' rejected submission: {state}")]
    Rejected {
        /// Name of the rejecting executor.
        executor: Arc<str>,
        /// State observed at rejection time.
        state: ExecutorState,
    },
}

impl SubmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Rejected { .. } => "submit_rejected",
        }
    }
}

/// # Failure of a single submitted action.
///
/// Captured on the worker and delivered only through that item's handle.
/// It never reaches other callers and never stops the worker loop.
///
/// `E` is the error type the action returned; it is kept as-is (behind an
/// `Arc`, so shared handles can clone the outcome). Pool consumers use the
/// default `String` form.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActionError<E = String> {
    /// The action returned an error.
    #[error("action failed: {error}")]
    Failed {
        /// The error returned by the action.
        error: Arc<E>,
    },

    /// The action panicked; the panic was caught on the worker.
    #[error("action panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string.
        message: String,
    },

    /// The worker went away before the action could run (runtime shut down).
    #[error("action abandoned before completion")]
    Abandoned,
}

impl<E> ActionError<E> {
    /// Builds [`ActionError::Failed`] from the action's error.
    ///
    /// # Example
    /// ```
    /// use taskline::ActionError;
    ///
    /// let err = ActionError::failed("disk full");
    /// assert_eq!(err.to_string(), "action failed: disk full");
    /// assert_eq!(err.error(), Some(&"disk full"));
    /// ```
    pub fn failed(error: E) -> Self {
        ActionError::Failed {
            error: Arc::new(error),
        }
    }

    /// The action's own error, if it returned one.
    pub fn error(&self) -> Option<&E> {
        match self {
            ActionError::Failed { error } => Some(error.as_ref()),
            ActionError::Panicked { .. } | ActionError::Abandoned => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionError::Failed { .. } => "action_failed",
            ActionError::Panicked { .. } => "action_panicked",
            ActionError::Abandoned => "action_abandoned",
        }
    }
}

impl<E> Clone for ActionError<E> {
    fn clone(&self) -> Self {
        match self {
            ActionError::Failed { error } => ActionError::Failed {
                error: Arc::clone(error),
            },
            ActionError::Panicked { message } => ActionError::Panicked {
                message: message.clone(),
            },
            ActionError::Abandoned => ActionError::Abandoned,
        }
    }
}

/// # Item refused by [`BoundedWorkQueue::try_push`](crate::BoundedWorkQueue::try_push).
///
/// Not a fault: a full queue is routine backpressure. The item is handed back
/// so the producer decides what to do with it.
#[derive(Error, PartialEq, Eq)]
pub enum TryEnqueueError<T> {
    /// Buffer is at capacity.
    #[error("queue full")]
    Full(T),
    /// Queue was closed.
    #[error("queue closed")]
    Closed(T),
}

impl<T> TryEnqueueError<T> {
    /// Returns the rejected item.
    pub fn into_inner(self) -> T {
        match self {
            TryEnqueueError::Full(item) | TryEnqueueError::Closed(item) => item,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TryEnqueueError::Full(_) => "queue_full",
            TryEnqueueError::Closed(_) => "queue_closed",
        }
    }
}

impl<T> fmt::Debug for TryEnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryEnqueueError::Full(_) => f.write_str("Full(..)"),
            TryEnqueueError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

/// Renders a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_enqueue_error_returns_item() {
        let err = TryEnqueueError::Full(7u32);
        assert_eq!(err.as_label(), "queue_full");
        assert_eq!(err.into_inner(), 7);

        let err = TryEnqueueError::Closed("job");
        assert_eq!(err.to_string(), "queue closed");
        assert_eq!(err.into_inner(), "job");
    }

    #[test]
    fn test_rejected_message_names_executor_and_state() {
        let err = SubmitError::Rejected {
            executor: Arc::from("ledger"),
            state: ExecutorState::Draining,
        };
        assert_eq!(
            err.to_string(),
            "executor 'ledger' rejected submission: draining"
        );
        assert_eq!(err.as_label(), "submit_rejected");
    }

    #[test]
    fn test_action_error_keeps_typed_error() {
        let err = ActionError::failed(std::io::Error::from(std::io::ErrorKind::NotFound));
        let copy = err.clone();
        assert_eq!(err.as_label(), "action_failed");
        assert_eq!(
            copy.error().map(std::io::Error::kind),
            Some(std::io::ErrorKind::NotFound)
        );
        assert!(ActionError::<std::io::Error>::Abandoned.error().is_none());
    }

    #[test]
    fn test_panic_message_downcasts() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
