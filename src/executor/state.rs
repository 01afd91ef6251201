use std::fmt;

/// Lifecycle of a [`SerialExecutor`](crate::SerialExecutor).
///
/// ```text
/// Created ──► Running ──► Draining ──► Stopped
///    └──────────────────────┘
/// ```
///
/// - `Created → Running`: worker loop started
/// - `Created | Running → Draining`: `shutdown()` called
/// - `→ Stopped`: loop saw intake closed and the queue empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorState {
    /// Built; worker loop not yet running. Submissions are buffered.
    Created,
    /// Accepting submissions and processing them.
    Running,
    /// No longer accepting submissions; processing what is queued.
    Draining,
    /// Loop exited; every accepted item has been resolved.
    Stopped,
}

impl ExecutorState {
    /// True while `submit` accepts work.
    #[inline]
    pub fn is_accepting(self) -> bool {
        matches!(self, ExecutorState::Created | ExecutorState::Running)
    }

    /// True once the loop has exited.
    #[inline]
    pub fn is_stopped(self) -> bool {
        matches!(self, ExecutorState::Stopped)
    }

    /// Returns a short stable label.
    pub fn as_label(self) -> &'static str {
        match self {
            ExecutorState::Created => "created",
            ExecutorState::Running => "running",
            ExecutorState::Draining => "draining",
            ExecutorState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
