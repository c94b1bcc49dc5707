//! Infrastructure adapters for the task queue, completed-task log, and artifact storage.

pub mod log;
pub mod queue;
pub mod storage;

pub use log::{CompletedTaskLog, InMemoryTaskLog, LogCounts};
pub use queue::{InMemoryQueue, TaskQueue};
pub use storage::{ArtifactStore, InMemoryStore, LocalDirStore, StoredArtifact};
