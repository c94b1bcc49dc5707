//! Task queue backends.

pub mod memory;

pub use memory::InMemoryQueue;

use crate::core::{ManagerError, Task};

/// Shared FIFO handoff between submitters and dispatchers.
///
/// Implementations must be safe to push and pop from many threads at once;
/// each pushed task is popped by at most one caller.
pub trait TaskQueue: Send + Sync {
    /// Append a task.
    ///
    /// # Errors
    ///
    /// `QueueFull` if the backend is bounded and at capacity.
    fn push(&self, task: Task) -> Result<(), ManagerError>;

    /// Take the oldest task without blocking.
    fn try_pop(&self) -> Option<Task>;

    /// Approximate number of queued tasks.
    fn len(&self) -> usize;

    /// Whether the queue is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
