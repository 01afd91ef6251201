//! Bounded, non-blocking work queue.
//!
//! - [`BoundedWorkQueue`] fixed-capacity FIFO buffer
//! - [`Dequeue`] dequeue outcome (`Item`, `Closed`, `Cancelled`)
//! - [`QueueState`] `Open → Draining → Closed`

mod bounded;

pub use bounded::{BoundedWorkQueue, Dequeue, QueueState};
