//! # Queue consumer abstraction.
//!
//! A [`Consume`] implementation handles items drained from a
//! [`BoundedWorkQueue`](crate::BoundedWorkQueue) by a [`WorkerPool`](crate::WorkerPool).
//! It receives a [`CancellationToken`] that fires when the pool is cancelled
//! or its shutdown grace runs out; long handlers should watch it.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ActionError;

/// # Asynchronous, cancelable item handler.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use taskline::{ActionError, Consume};
///
/// struct Mailer;
///
/// #[async_trait]
/// impl Consume<String> for Mailer {
///     fn name(&self) -> &str { "mailer" }
///
///     async fn consume(&self, to: String, ctx: CancellationToken) -> Result<(), ActionError> {
///         if ctx.is_cancelled() {
///             return Err(ActionError::failed(format!("not sent to {to}")));
///         }
///         // send...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Consume<T: Send + 'static>: Send + Sync + 'static {
    /// Returns a stable, human-readable consumer name.
    fn name(&self) -> &str;

    /// Handles one item.
    ///
    /// Errors and panics are reported through pool events; they never stop the consumer task.
    async fn consume(&self, item: T, ctx: CancellationToken) -> Result<(), ActionError>;
}
