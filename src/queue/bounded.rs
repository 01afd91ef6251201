//! # BoundedWorkQueue: fixed-capacity FIFO with visible backpressure.
//!
//! Producers never block: an insert into a full queue fails immediately and
//! the producer decides what to do. Consumers suspend while the queue is
//! empty and open, and wake on insert, close, or cancellation.
//!
//! ## State machine
//! ```text
//! Open ──close()──► Draining (closed, items left) ──last dequeue──► Closed (closed, empty)
//! ```
//!
//! ## Rules
//! - `len() <= capacity()` at all times.
//! - Strict FIFO; no priorities, no reordering.
//! - The size check and the insert/remove happen under one lock.
//! - Cancelling a waiting `dequeue` never removes an item.
//! - Waiting uses `Notify`, not a polling interval.
//!
//! ## Example
//! ```rust
//! use taskline::{BoundedWorkQueue, Dequeue};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue = BoundedWorkQueue::new(2);
//! assert!(queue.try_enqueue("a"));
//! assert!(queue.try_enqueue("b"));
//! assert!(!queue.try_enqueue("c")); // full: backpressure, not an error
//!
//! queue.close();
//! let token = CancellationToken::new();
//! assert_eq!(queue.dequeue(&token).await, Dequeue::Item("a"));
//! assert_eq!(queue.dequeue(&token).await, Dequeue::Item("b"));
//! assert_eq!(queue.dequeue(&token).await, Dequeue::Closed);
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;
use crate::error::TryEnqueueError;

/// Result of [`BoundedWorkQueue::dequeue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dequeue<T> {
    /// Oldest buffered item.
    Item(T),
    /// Queue is closed and fully drained.
    Closed,
    /// The cancellation token fired while waiting.
    Cancelled,
}

impl<T> Dequeue<T> {
    /// Returns the item, if any.
    pub fn into_item(self) -> Option<T> {
        match self {
            Dequeue::Item(item) => Some(item),
            Dequeue::Closed | Dequeue::Cancelled => None,
        }
    }
}

/// Observable queue lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Accepting items.
    Open,
    /// Closed for inserts; buffered items remain.
    Draining,
    /// Closed and empty; every `dequeue` returns [`Dequeue::Closed`].
    Closed,
}

/// Buffer plus closed flag; guarded together.
struct Buffer<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Fixed-capacity FIFO channel between producers and consumers.
///
/// Consumer-count agnostic: share it behind an `Arc` and dequeue from as many
/// tasks as needed.
pub struct BoundedWorkQueue<T> {
    buffer: Mutex<Buffer<T>>,
    capacity: usize,
    notify: Notify,
}

impl<T> BoundedWorkQueue<T> {
    /// Creates an open, empty queue. `capacity` is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Mutex::new(Buffer {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Creates a queue from configuration.
    pub fn with_config(cfg: &QueueConfig) -> Self {
        Self::new(cfg.capacity_clamped())
    }

    /// Appends `item` unless the queue is full or closed. Never blocks.
    ///
    /// Returns `false` as backpressure; the item is dropped. Use
    /// [`try_push`](Self::try_push) to get it back.
    pub fn try_enqueue(&self, item: T) -> bool {
        self.try_push(item).is_ok()
    }

    /// Appends `item` unless the queue is full or closed, returning it on refusal.
    pub fn try_push(&self, item: T) -> Result<(), TryEnqueueError<T>> {
        {
            let mut buf = self.lock();
            if buf.closed {
                return Err(TryEnqueueError::Closed(item));
            }
            if buf.items.len() >= self.capacity {
                return Err(TryEnqueueError::Full(item));
            }
            buf.items.push_back(item);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Removes and returns the oldest item.
    ///
    /// - suspends only while the queue is empty and open;
    /// - returns [`Dequeue::Closed`] once closed and drained;
    /// - returns [`Dequeue::Cancelled`] promptly when `cancel` fires, leaving the buffer untouched.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Dequeue<T> {
        loop {
            // Register interest before checking, so an insert or close between
            // the check and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut buf = self.lock();
                if let Some(item) = buf.items.pop_front() {
                    let more = !buf.items.is_empty();
                    drop(buf);
                    if more {
                        // Pass the wakeup on; several items may have arrived for one notification.
                        self.notify.notify_one();
                    }
                    return Dequeue::Item(item);
                }
                if buf.closed {
                    return Dequeue::Closed;
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Dequeue::Cancelled,
                _ = &mut notified => {}
            }
        }
    }

    /// Removes the oldest item without waiting.
    pub fn try_dequeue(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Closes the queue for inserts and wakes every waiting consumer.
    ///
    /// Buffered items stay available to `dequeue`. Idempotent.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Current number of buffered items (snapshot; do not synchronize on it).
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// True if no items are buffered (snapshot).
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current lifecycle state (snapshot).
    pub fn state(&self) -> QueueState {
        let buf = self.lock();
        match (buf.closed, buf.items.is_empty()) {
            (false, _) => QueueState::Open,
            (true, false) => QueueState::Draining,
            (true, true) => QueueState::Closed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffer<T>> {
        // No critical section can panic midway; a poisoned buffer is still consistent.
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for BoundedWorkQueue<T> {
    fn default() -> Self {
        Self::with_config(&QueueConfig::default())
    }
}

impl<T> fmt::Debug for BoundedWorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buf = self.lock();
        f.debug_struct("BoundedWorkQueue")
            .field("len", &buf.items.len())
            .field("capacity", &self.capacity)
            .field("closed", &buf.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_backpressure_at_capacity() {
        let q = BoundedWorkQueue::new(3);
        for i in 0..3 {
            assert!(q.try_enqueue(i));
        }
        assert!(!q.try_enqueue(3));
        assert_eq!(q.len(), 3);

        assert_eq!(q.try_dequeue(), Some(0));
        assert!(q.try_enqueue(4));
        assert!(!q.try_enqueue(5));
    }

    #[test]
    fn test_try_push_hands_item_back() {
        let q = BoundedWorkQueue::new(0);
        assert_eq!(q.capacity(), 1);
        assert_eq!(q.try_push("a"), Ok(()));
        assert_eq!(q.try_push("b"), Err(TryEnqueueError::Full("b")));

        q.close();
        let err = q.try_push("c").unwrap_err();
        assert_eq!(err.as_label(), "queue_closed");
        assert_eq!(err.into_inner(), "c");
    }

    #[tokio::test]
    async fn test_close_drains_then_reports_closed() {
        let q = BoundedWorkQueue::new(8);
        for i in 0..5 {
            assert!(q.try_enqueue(i));
        }
        q.close();
        assert_eq!(q.state(), QueueState::Draining);
        assert!(!q.try_enqueue(99));

        let token = CancellationToken::new();
        for i in 0..5 {
            assert_eq!(q.dequeue(&token).await, Dequeue::Item(i));
        }
        assert_eq!(q.dequeue(&token).await, Dequeue::Closed);
        assert_eq!(q.dequeue(&token).await, Dequeue::Closed);
        assert_eq!(q.state(), QueueState::Closed);
    }

    #[tokio::test]
    async fn test_waiting_consumer_wakes_on_enqueue() {
        let q = Arc::new(BoundedWorkQueue::new(1));
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.dequeue(&CancellationToken::new()).await })
        };
        tokio::task::yield_now().await;
        assert!(q.try_enqueue(42));
        assert_eq!(consumer.await.unwrap(), Dequeue::Item(42));
    }

    #[tokio::test]
    async fn test_close_wakes_all_waiters() {
        let q = Arc::new(BoundedWorkQueue::<u8>::new(4));
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let q = q.clone();
            waiters.push(tokio::spawn(async move {
                q.dequeue(&CancellationToken::new()).await
            }));
        }
        tokio::task::yield_now().await;
        q.close();
        for w in waiters {
            assert_eq!(w.await.unwrap(), Dequeue::Closed);
        }
    }

    #[tokio::test]
    async fn test_cancel_returns_promptly_and_keeps_buffer() {
        let q = Arc::new(BoundedWorkQueue::<u32>::new(2));
        let token = CancellationToken::new();
        let waiter = {
            let q = q.clone();
            let token = token.clone();
            tokio::spawn(async move { q.dequeue(&token).await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        let res = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled dequeue returns promptly")
            .unwrap();
        assert_eq!(res, Dequeue::Cancelled);

        // A buffered item is handed out without waiting, even with a cancelled token.
        assert!(q.try_enqueue(7));
        assert_eq!(q.dequeue(&token).await, Dequeue::Item(7));
        assert!(q.try_enqueue(8));
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue(&CancellationToken::new()).await, Dequeue::Item(8));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_never_exceed_capacity() {
        let q = Arc::new(BoundedWorkQueue::new(16));
        let mut producers = Vec::new();
        for p in 0..8u32 {
            let q = q.clone();
            producers.push(tokio::spawn(async move {
                let mut accepted = 0u32;
                for i in 0..100u32 {
                    if q.try_enqueue(p * 1000 + i) {
                        accepted += 1;
                    }
                    assert!(q.len() <= q.capacity());
                    tokio::task::yield_now().await;
                }
                accepted
            }));
        }

        let consumer = {
            let q = q.clone();
            tokio::spawn(async move {
                let token = CancellationToken::new();
                let mut got = Vec::new();
                while let Dequeue::Item(v) = q.dequeue(&token).await {
                    got.push(v);
                }
                got
            })
        };

        let mut accepted = 0;
        for p in producers {
            accepted += p.await.unwrap();
        }
        q.close();
        let got = consumer.await.unwrap();
        assert_eq!(got.len() as u32, accepted);

        // Per producer, items come out in the order they went in.
        for p in 0..8u32 {
            let mine: Vec<u32> = got.iter().copied().filter(|v| v / 1000 == p).collect();
            assert!(mine.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
