//! Completed-task log backends.

pub mod memory;

pub use memory::InMemoryTaskLog;

use serde::{Deserialize, Serialize};

use crate::core::Task;

/// Totals of finished tasks by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCounts {
    /// Tasks that finished `Completed`.
    pub completed: usize,
    /// Tasks that finished `Failed`.
    pub failed: usize,
}

impl LogCounts {
    /// All finished tasks.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.completed + self.failed
    }
}

/// Append-only record of finished tasks.
pub trait CompletedTaskLog: Send + Sync {
    /// Append a finished task. Returns `false` if a task with the same id was
    /// already recorded; the log is left unchanged in that case.
    fn record(&self, task: Task) -> bool;

    /// Look up a recorded task.
    fn get(&self, id: &str) -> Option<Task>;

    /// All recorded tasks in completion order.
    fn snapshot(&self) -> Vec<Task>;

    /// Number of recorded tasks.
    fn len(&self) -> usize;

    /// Whether nothing has been recorded.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Totals by outcome.
    fn counts(&self) -> LogCounts;
}
