//! # taskline
//!
//! **Taskline** provides two small building blocks for ordering and
//! buffering async work in a tokio application:
//!
//! - [`SerialExecutor`]: an active object that owns one worker and runs
//!   submitted actions strictly one at a time, in submission order, from any
//!   number of producers. Callers get a [`Handle`] for each action's result.
//! - [`BoundedWorkQueue`]: a fixed-capacity FIFO buffer whose producers
//!   never block (`try_enqueue` reports a full buffer instead) and whose
//!   consumers wait until work arrives. A [`WorkerPool`] drains it with N
//!   consumer tasks.
//!
//! ## Architecture
//! ### SerialExecutor
//! ```text
//!  producer A ─┐
//!  producer B ─┼─ submit(action) ──► intake lock ──► mpsc (unbounded) ──► Worker::run()
//!  producer C ─┘        │            (id, send,                              │
//!                       │             rejection)                             │ one item at a time
//!                       ▼                                                    ▼
//!              Handle<T, E> ◄──────────── oneshot ◄──────── action().catch_unwind()
//!
//!  shutdown():  Running ──► Draining (intake closed) ──► queue drained ──► Stopped
//!                   └──► DrainSignal resolves on Stopped
//! ```
//!
//! ### BoundedWorkQueue + WorkerPool
//! ```text
//!  producers ── try_enqueue ──► [ item | item | item | ... capacity ]
//!                  │                         │
//!                  └─ false when full        ├──► consumer 0 ──► Consume::consume(item, ctx)
//!                     or closed              ├──► consumer 1 ──► Consume::consume(item, ctx)
//!                                            └──► consumer N ──► Consume::consume(item, ctx)
//! ```
//!
//! ### Events
//! ```text
//!  executor / pool ── publish(Event) ──► Bus (broadcast) ──► listener ──► SubscriberSet
//!                                                                  ┌─────────┼─────────┐
//!                                                                  ▼         ▼         ▼
//!                                                               worker1   worker2   workerN
//!                                                                  ▼         ▼         ▼
//!                                                               sub1.on   sub2.on   subN.on
//!                                                               _event()  _event()  _event()
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Serial work**   | Ordered, non-overlapping execution with result handles.      | [`SerialExecutor`], [`Handle`]              |
//! | **Shutdown**      | Drain accepted work, observe completion, optional grace.     | [`DrainSignal`], [`ExecutorState`]          |
//! | **Buffering**     | Non-blocking bounded FIFO with cancellable waits.            | [`BoundedWorkQueue`], [`Dequeue`]           |
//! | **Consumers**     | Pool of queue consumers with bounded shutdown.               | [`WorkerPool`], [`Consume`], [`ConsumeFn`]  |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).       | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for submission, actions and runtime.            | [`SubmitError`], [`ActionError`]            |
//! | **Configuration** | Names, capacities and grace periods.                         | [`ExecutorConfig`], [`QueueConfig`]         |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use taskline::{ExecutorConfig, SerialExecutor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn taskline::Subscribe>> = vec![Arc::new(taskline::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn taskline::Subscribe>> = Vec::new();
//!
//!     let exec = SerialExecutor::builder(ExecutorConfig::named("ledger"))
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let first = exec.submit(|| async { Ok::<_, std::io::Error>("debit") })?;
//!     let second = exec.submit_sync(|| Ok::<_, std::io::Error>("credit"))?;
//!
//!     exec.shutdown().await;
//!     assert_eq!(first.await?, "debit");
//!     assert_eq!(second.await?, "credit");
//!     assert!(exec.submit_sync(|| Ok::<_, std::io::Error>(())).is_err());
//!     Ok(())
//! }
//! ```
mod config;
mod error;
mod events;
mod executor;
mod pool;
mod queue;
mod subscribers;

// ---- Public re-exports ----

pub use config::{ExecutorConfig, PoolConfig, QueueConfig};
pub use error::{ActionError, RuntimeError, SubmitError, TryEnqueueError};
pub use events::{Bus, Event, EventKind};
pub use executor::{DrainSignal, ExecutorState, Handle, SerialExecutor, SerialExecutorBuilder};
pub use pool::{Consume, ConsumeFn, WorkerPool};
pub use queue::{BoundedWorkQueue, Dequeue, QueueState};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
