//! API-facing request/response models.

use serde::{Deserialize, Serialize};

use crate::core::{Action, Task, WorkerInstance, WorkerStatus};
use crate::util::serde::{InstanceId, TaskId};

/// Task submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Caller-chosen identifier; a UUID is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Display name.
    pub name: String,
    /// Target resource.
    #[serde(default)]
    pub url: String,
    /// Actions, run in order.
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl TaskSubmission {
    /// Build the pending task.
    #[must_use]
    pub fn into_task(self) -> Task {
        match self.task_id {
            Some(id) => Task::with_id(id, self.name, self.url, self.actions),
            None => Task::new(self.name, self.url, self.actions),
        }
    }
}

/// Per-instance status row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    /// Instance identifier.
    pub id: InstanceId,
    /// Endpoint URL.
    pub url: String,
    /// Health status.
    pub status: WorkerStatus,
    /// Tasks currently executing.
    pub active_tasks: u32,
    /// Tasks finished successfully.
    pub completed_tasks: u64,
    /// Tasks finished with a failure.
    pub failed_tasks: u64,
    /// Consecutive failed health checks.
    pub health_check_failures: u32,
    /// Last probe time (ms since epoch, 0 = never).
    pub last_check_ms: u64,
    /// Session token from the last successful handshake.
    pub session_id: Option<String>,
}

impl From<&WorkerInstance> for InstanceStatus {
    fn from(instance: &WorkerInstance) -> Self {
        Self {
            id: instance.id().to_string(),
            url: instance.url().to_string(),
            status: instance.status(),
            active_tasks: instance.active_tasks(),
            completed_tasks: instance.completed_tasks(),
            failed_tasks: instance.failed_tasks(),
            health_check_failures: instance.health_check_failures(),
            last_check_ms: instance.last_check_ms(),
            session_id: instance.session_id(),
        }
    }
}

/// Best-effort cluster snapshot; fields are read independently and may be
/// slightly inconsistent with each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// Whether the background loops are running.
    pub monitoring: bool,
    /// Per-instance rows in registration order.
    pub instances: Vec<InstanceStatus>,
    /// Tasks waiting in the queue.
    pub queue_size: usize,
    /// Tasks finished `completed`.
    pub completed_tasks: usize,
    /// Tasks finished `failed`.
    pub failed_tasks: usize,
}

impl ClusterStatus {
    /// Number of instances currently healthy.
    #[must_use]
    pub fn healthy_instances(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.status == WorkerStatus::Healthy)
            .count()
    }

    /// Tasks currently executing across the cluster.
    #[must_use]
    pub fn active_tasks(&self) -> u64 {
        self.instances.iter().map(|i| u64::from(i.active_tasks)).sum()
    }
}
