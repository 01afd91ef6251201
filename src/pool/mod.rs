//! Consumer pool over a [`BoundedWorkQueue`](crate::BoundedWorkQueue).
//!
//! - [`Consume`] item handler trait
//! - [`ConsumeFn`] closure-backed handler
//! - [`WorkerPool`] N consumer tasks with graceful, bounded shutdown

mod consume;
mod consume_fn;
mod worker_pool;

pub use consume::Consume;
pub use consume_fn::ConsumeFn;
pub use worker_pool::WorkerPool;
