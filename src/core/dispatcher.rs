//! Per-instance dispatch loop.
//!
//! Each registered instance gets one [`Dispatcher`]. While its instance is
//! healthy and below the concurrency limit, the loop claims the next queued
//! task and spawns its execution as a separate tokio task, so up to `limit`
//! executions can be in flight for one instance. Execution state is owned by
//! the spawned task; the slot it holds is released by a drop guard on every
//! exit path.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::executor::ActionExecutor;
use super::instance::{SlotGuard, WorkerInstance};
use super::task::{Task, TaskResult};
use crate::config::ManagerConfig;
use crate::infra::{CompletedTaskLog, TaskQueue};
use crate::protocol::{ClientFactory, WorkerClient};

/// Result message for a task whose handshake failed.
pub const HANDSHAKE_FAILED: &str = "unable to initialize connection";

/// Pacing and limits for a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Maximum concurrently active tasks on the instance.
    pub concurrency_limit: u32,
    /// Sleep when the queue is empty.
    pub idle_backoff: Duration,
    /// Sleep when the instance is unhealthy or saturated.
    pub busy_backoff: Duration,
    /// Sleep after a failed iteration.
    pub error_backoff: Duration,
    /// Bound on the action phase of one task.
    pub task_timeout: Option<Duration>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&ManagerConfig::default())
    }
}

impl From<&ManagerConfig> for DispatchSettings {
    fn from(cfg: &ManagerConfig) -> Self {
        Self {
            concurrency_limit: cfg.max_concurrent_per_instance,
            idle_backoff: Duration::from_millis(cfg.dispatch.idle_backoff_ms),
            busy_backoff: Duration::from_millis(cfg.dispatch.busy_backoff_ms),
            error_backoff: Duration::from_millis(cfg.dispatch.error_backoff_ms),
            task_timeout: cfg.dispatch.task_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Collaborators shared by every dispatcher of a manager.
#[derive(Clone)]
pub struct DispatchShared {
    /// Pending tasks.
    pub queue: Arc<dyn TaskQueue>,
    /// Finished tasks.
    pub log: Arc<dyn CompletedTaskLog>,
    /// Source of fresh clients.
    pub factory: Arc<dyn ClientFactory>,
    /// Action runner.
    pub executor: ActionExecutor,
    /// Signalled after each task is logged.
    pub finished: Arc<Notify>,
}

enum Step {
    Dispatched,
    Idle,
    Busy,
}

struct Inner {
    instance: Arc<WorkerInstance>,
    shared: DispatchShared,
    settings: DispatchSettings,
}

/// Dispatch loop bound to one instance.
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create a dispatcher for `instance`.
    #[must_use]
    pub fn new(instance: Arc<WorkerInstance>, shared: DispatchShared, settings: DispatchSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                instance,
                shared,
                settings,
            }),
        }
    }

    /// Run until `cancel` fires, then wait for in-flight executions.
    pub async fn run(self, cancel: CancellationToken) {
        let instance_id = self.inner.instance.id().to_string();
        info!(instance = %instance_id, "dispatcher started");
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        while !cancel.is_cancelled() {
            in_flight.retain(|h| !h.is_finished());

            let step = std::panic::catch_unwind(AssertUnwindSafe(|| self.try_dispatch()));
            let pause = match step {
                Ok(Ok(handle)) => {
                    in_flight.push(handle);
                    Step::Dispatched
                }
                Ok(Err(step)) => step,
                Err(_) => {
                    error!(instance = %instance_id, "dispatch iteration panicked");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.inner.settings.error_backoff) => {}
                    }
                    continue;
                }
            };

            let delay = match pause {
                Step::Dispatched => {
                    tokio::task::yield_now().await;
                    continue;
                }
                Step::Idle => self.inner.settings.idle_backoff,
                Step::Busy => self.inner.settings.busy_backoff,
            };
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        if !in_flight.is_empty() {
            debug!(instance = %instance_id, in_flight = in_flight.len(), "waiting for in-flight tasks");
        }
        for handle in in_flight {
            if let Err(e) = handle.await {
                warn!(instance = %instance_id, error = %e, "task execution aborted");
            }
        }
        info!(instance = %instance_id, "dispatcher stopped");
    }

    fn try_dispatch(&self) -> Result<JoinHandle<()>, Step> {
        let inner = &self.inner;
        if !inner.instance.is_healthy() {
            return Err(Step::Busy);
        }
        let Some(slot) = SlotGuard::acquire(&inner.instance, inner.settings.concurrency_limit) else {
            return Err(Step::Busy);
        };
        let Some(mut task) = inner.shared.queue.try_pop() else {
            return Err(Step::Idle);
        };

        task.mark_running(inner.instance.id());
        info!(instance = %inner.instance.id(), task = %task.id, name = %task.name, "task claimed");

        let exec = Arc::clone(inner);
        Ok(tokio::spawn(async move { exec.execute(task, slot).await }))
    }
}

impl Inner {
    async fn execute(&self, mut task: Task, slot: SlotGuard) {
        let mut client = self.shared.factory.connect(self.instance.url());
        let result = AssertUnwindSafe(self.perform(&mut *client, &task))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(instance = %self.instance.id(), task = %task.id, "task execution panicked");
                TaskResult::failure("task execution panicked")
            });
        client.close();

        let success = result.success;
        task.finish(result);
        self.instance.record_outcome(success);
        drop(slot);

        if success {
            info!(instance = %self.instance.id(), task = %task.id, duration_ms = ?task.duration_ms(), "task completed");
        } else {
            let reason = task.result.as_ref().and_then(|r| r.error.clone()).unwrap_or_default();
            warn!(instance = %self.instance.id(), task = %task.id, reason = %reason, "task failed");
        }

        if !self.shared.log.record(task) {
            warn!(instance = %self.instance.id(), "task already present in completed log");
        }
        self.shared.finished.notify_waiters();
    }

    async fn perform(&self, client: &mut dyn WorkerClient, task: &Task) -> TaskResult {
        if !client.open().await {
            return TaskResult::failure(HANDSHAKE_FAILED);
        }
        let run = self.shared.executor.run_task(client, &task.actions);
        match self.settings.task_timeout {
            None => run.await,
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => TaskResult::failure(format!("task timed out after {}ms", limit.as_millis())),
            },
        }
    }
}
