//! # Function-backed consumer (`ConsumeFn`)
//!
//! [`ConsumeFn`] wraps a closure `F: Fn(T, CancellationToken) -> Fut`,
//! producing a fresh future per item. If handlers need shared state, capture
//! an `Arc<...>` explicitly inside the closure.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use taskline::{Consume, ConsumeFn};
//!
//! let c: Arc<dyn Consume<u64>> = ConsumeFn::arc("printer", |n: u64, _ctx: CancellationToken| async move {
//!     println!("item {n}");
//!     Ok::<_, std::io::Error>(())
//! });
//!
//! assert_eq!(c.name(), "printer");
//! ```

use std::borrow::Cow;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ActionError;
use crate::pool::Consume;

/// Function-backed consumer.
#[derive(Debug)]
pub struct ConsumeFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ConsumeFn<F> {
    /// Creates a new function-backed consumer.
    ///
    /// Prefer [`ConsumeFn::arc`] when you immediately need a shared handle.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the consumer and returns it behind an `Arc`.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<T, F, Fut, E> Consume<T> for ConsumeFn<F>
where
    T: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn consume(&self, item: T, ctx: CancellationToken) -> Result<(), ActionError> {
        (self.f)(item, ctx)
            .await
            .map_err(|e| ActionError::failed(e.to_string()))
    }
}
