//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by executors, worker pools and
//! subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `SerialExecutor::submit`, the executor worker loop,
//!   `WorkerPool` consumers, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the listener task forwarding to a `SubscriberSet`,
//!   and any receiver obtained through `events()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
