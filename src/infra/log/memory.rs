//! In-memory completed-task log.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{CompletedTaskLog, LogCounts};
use crate::core::{Task, TaskStatus};
use crate::util::serde::TaskId;

#[derive(Default)]
struct Entries {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    counts: LogCounts,
}

/// In-process completed-task log.
#[derive(Default)]
pub struct InMemoryTaskLog {
    inner: RwLock<Entries>,
}

impl InMemoryTaskLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompletedTaskLog for InMemoryTaskLog {
    fn record(&self, task: Task) -> bool {
        let mut inner = self.inner.write();
        if inner.index.contains_key(&task.id) {
            return false;
        }
        match task.status {
            TaskStatus::Completed => inner.counts.completed += 1,
            _ => inner.counts.failed += 1,
        }
        let position = inner.tasks.len();
        inner.index.insert(task.id.clone(), position);
        inner.tasks.push(task);
        true
    }

    fn get(&self, id: &str) -> Option<Task> {
        let inner = self.inner.read();
        inner.index.get(id).map(|&i| inner.tasks[i].clone())
    }

    fn snapshot(&self) -> Vec<Task> {
        self.inner.read().tasks.clone()
    }

    fn len(&self) -> usize {
        self.inner.read().tasks.len()
    }

    fn counts(&self) -> LogCounts {
        self.inner.read().counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskResult;

    fn finished(id: &str, success: bool) -> Task {
        let mut task = Task::with_id(id, id, "", vec![]);
        task.mark_running("w1");
        let result = if success {
            TaskResult::from_outcomes(vec![])
        } else {
            TaskResult::failure("boom")
        };
        task.finish(result);
        task
    }

    #[test]
    fn test_records_each_task_once() {
        let log = InMemoryTaskLog::new();
        assert!(log.record(finished("a", true)));
        assert!(log.record(finished("b", false)));
        assert!(!log.record(finished("a", false)));

        assert_eq!(log.len(), 2);
        assert_eq!(log.counts(), LogCounts { completed: 1, failed: 1 });
        assert_eq!(log.get("a").unwrap().status, TaskStatus::Completed);
        assert!(log.get("missing").is_none());
    }
}
