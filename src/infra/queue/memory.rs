//! In-memory FIFO queue on a crossbeam channel.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError, TrySendError};
use tracing::warn;

use super::TaskQueue;
use crate::core::{ManagerError, Task};

/// Multi-producer multi-consumer FIFO. Both channel ends live in the queue,
/// so it never disconnects.
pub struct InMemoryQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    max_depth: Option<usize>,
}

impl InMemoryQueue {
    /// Unbounded queue.
    #[must_use]
    pub fn unbounded() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            max_depth: None,
        }
    }

    /// Queue that rejects pushes beyond `max_depth` tasks.
    #[must_use]
    pub fn bounded(max_depth: usize) -> Self {
        let (tx, rx) = bounded(max_depth);
        Self {
            tx,
            rx,
            max_depth: Some(max_depth),
        }
    }

    /// Queue sized by an optional limit.
    #[must_use]
    pub fn with_max_depth(max_depth: Option<usize>) -> Self {
        max_depth.map_or_else(Self::unbounded, Self::bounded)
    }

    /// Configured capacity, if bounded.
    #[must_use]
    pub const fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl TaskQueue for InMemoryQueue {
    fn push(&self, task: Task) -> Result<(), ManagerError> {
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                warn!(task = %task.id, "task queue is full");
                Err(ManagerError::QueueFull(format!(
                    "max queue depth {} reached",
                    self.max_depth.unwrap_or_default()
                )))
            }
            Err(TrySendError::Disconnected(task)) => {
                Err(ManagerError::QueueFull(format!("queue closed, dropping task {}", task.id)))
            }
        }
    }

    fn try_pop(&self) -> Option<Task> {
        match self.rx.try_recv() {
            Ok(task) => Some(task),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn len(&self) -> usize {
        self.rx.len()
    }
}
