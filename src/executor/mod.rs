//! Serial executor: one worker, one action at a time, FIFO.
//!
//! Public API from this module: [`SerialExecutor`] (+ builder), [`Handle`],
//! [`DrainSignal`] and [`ExecutorState`].
//!
//! Internal modules:
//! - [`item`]: type-erased unit of work carrying its completion signal;
//! - [`worker`]: the processing loop;
//! - [`core`]: intake, submission, shutdown;
//! - [`drain`]: shutdown completion signal.

mod core;
mod drain;
mod handle;
mod item;
mod state;
mod worker;

pub use self::core::{SerialExecutor, SerialExecutorBuilder};
pub use drain::DrainSignal;
pub use handle::Handle;
pub use state::ExecutorState;
