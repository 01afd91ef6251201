//! # Runtime configuration.
//!
//! Provides [`ExecutorConfig`], [`QueueConfig`] and [`PoolConfig`]: plain
//! structs with public fields and helper accessors for their sentinel values.
//!
//! ## Sentinel values
//! - `grace = 0s` → no limit (drain waits as long as actions take)
//! - `bus_capacity`, `capacity`, `workers` → clamped to a minimum of 1

use std::borrow::Cow;
use std::time::Duration;

/// Configuration of a [`SerialExecutor`](crate::SerialExecutor).
///
/// ## Field semantics
/// - `name`: executor name used in events, logs and errors
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `grace`: limit for [`shutdown_and_wait`](crate::SerialExecutor::shutdown_and_wait) (`0s` = no limit)
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Executor name.
    pub name: Cow<'static, str>,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers lagging more than `bus_capacity` events skip the oldest ones.
    pub bus_capacity: usize,

    /// Maximum time `shutdown_and_wait` waits for queued work to finish.
    ///
    /// In-flight actions are never cancelled; exceeding the grace only
    /// reports `RuntimeError::GraceExceeded`.
    pub grace: Duration,
}

impl ExecutorConfig {
    /// Creates a default configuration with the given name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the drain grace as an `Option`.
    ///
    /// - `None` → wait without limit
    /// - `Some(d)` → give up waiting after `d`
    #[inline]
    pub fn grace_limit(&self) -> Option<Duration> {
        (self.grace != Duration::ZERO).then_some(self.grace)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ExecutorConfig {
    /// Default configuration:
    ///
    /// - `name = "serial"`
    /// - `bus_capacity = 1024`
    /// - `grace = 0s` (no limit)
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("serial"),
            bus_capacity: 1024,
            grace: Duration::ZERO,
        }
    }
}

/// Configuration of a [`BoundedWorkQueue`](crate::BoundedWorkQueue).
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Maximum number of buffered items (min 1).
    pub capacity: usize,
}

impl QueueConfig {
    /// Returns the capacity clamped to a minimum of 1.
    #[inline]
    pub fn capacity_clamped(&self) -> usize {
        self.capacity.max(1)
    }
}

impl Default for QueueConfig {
    /// `capacity = 100`.
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

/// Configuration of a [`WorkerPool`](crate::WorkerPool).
///
/// ## Field semantics
/// - `workers`: number of consumer tasks (min 1)
/// - `grace`: limit for [`WorkerPool::shutdown`](crate::WorkerPool::shutdown) (`0s` = no limit);
///   when exceeded, consumers are cancelled
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Pool name used in events and logs.
    pub name: Cow<'static, str>,
    /// Number of consumer tasks draining the queue.
    pub workers: usize,
    /// Capacity of the pool event bus.
    pub bus_capacity: usize,
    /// Maximum time `shutdown` waits for the queue to be drained.
    pub grace: Duration,
}

impl PoolConfig {
    /// Creates a default configuration with the given name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the worker count clamped to a minimum of 1.
    #[inline]
    pub fn workers_clamped(&self) -> usize {
        self.workers.max(1)
    }

    /// Returns the drain grace as an `Option` (`None` = no limit).
    #[inline]
    pub fn grace_limit(&self) -> Option<Duration> {
        (self.grace != Duration::ZERO).then_some(self.grace)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `name = "pool"`
    /// - `workers = 1`
    /// - `bus_capacity = 1024`
    /// - `grace = 30s`
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("pool"),
            workers: 1,
            bus_capacity: 1024,
            grace: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.grace_limit(), None);

        let cfg = ExecutorConfig {
            grace: Duration::from_secs(2),
            bus_capacity: 0,
            ..ExecutorConfig::named("ledger")
        };
        assert_eq!(cfg.grace_limit(), Some(Duration::from_secs(2)));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.name, "ledger");

        assert_eq!(QueueConfig { capacity: 0 }.capacity_clamped(), 1);

        let pool = PoolConfig {
            workers: 0,
            ..PoolConfig::default()
        };
        assert_eq!(pool.workers_clamped(), 1);
        assert_eq!(pool.grace_limit(), Some(Duration::from_secs(30)));
    }
}
