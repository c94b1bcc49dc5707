//! Cluster manager: registry, queue, and the background loops.
//!
//! Instances are registered before monitoring starts. `start_monitoring`
//! spawns one health monitor and one dispatcher per instance, all sharing a
//! single cancellation token. `stop_monitoring` cancels the token and joins
//! each loop with a bounded timeout; loops that miss the deadline are left to
//! finish on their own.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::dispatcher::{DispatchSettings, DispatchShared, Dispatcher};
use super::health::{HealthMonitor, HealthPolicy};
use super::instance::{WorkerInstance, WorkerRegistry};
use super::task::{Task, TaskStatus};
use super::ManagerError;
use crate::config::ManagerConfig;
use crate::infra::{CompletedTaskLog, LogCounts};
use crate::runtime::api::{ClusterStatus, InstanceStatus, TaskSubmission};
use crate::util::serde::TaskId;

struct Loops {
    cancel: CancellationToken,
    handles: Vec<(String, JoinHandle<()>)>,
}

/// Coordinates worker instances, the shared queue, and the completed-task log.
pub struct ClusterManager {
    config: ManagerConfig,
    registry: Arc<WorkerRegistry>,
    shared: DispatchShared,
    loops: Mutex<Option<Loops>>,
    submitted: Mutex<HashSet<TaskId>>,
}

impl ClusterManager {
    pub(crate) fn from_parts(config: ManagerConfig, registry: Arc<WorkerRegistry>, shared: DispatchShared) -> Self {
        Self {
            config,
            registry,
            shared,
            loops: Mutex::new(None),
            submitted: Mutex::new(HashSet::new()),
        }
    }

    /// Manager with the default collaborators for `config`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` or `DuplicateInstance` from the configured instance list.
    pub fn new(config: ManagerConfig) -> Result<Self, ManagerError> {
        crate::builders::ManagerBuilder::new(config).build()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register an instance.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` while monitoring, `InvalidConfig` for a malformed URL,
    /// `DuplicateInstance` for a reused id.
    pub fn add_instance(&self, id: impl Into<String>, url: impl Into<String>) -> Result<Arc<WorkerInstance>, ManagerError> {
        // Held through registration so a concurrent start sees this instance.
        let loops = self.loops.lock();
        if loops.is_some() {
            return Err(ManagerError::AlreadyRunning);
        }
        let (id, url) = (id.into(), url.into());
        if id.trim().is_empty() {
            return Err(ManagerError::InvalidConfig("instance id must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ManagerError::InvalidConfig(format!(
                "instance `{id}` url must start with http:// or https://"
            )));
        }
        let instance = self.registry.register(id, url)?;
        drop(loops);
        info!(instance = %instance.id(), url = %instance.url(), "instance registered");
        Ok(instance)
    }

    /// Spawn the health monitor and one dispatcher per instance on the
    /// current Tokio runtime.
    ///
    /// # Errors
    ///
    /// `NoRuntime` outside a runtime, `AlreadyRunning` if already started.
    pub fn start_monitoring(&self) -> Result<(), ManagerError> {
        let handle = Handle::try_current().map_err(|_| ManagerError::NoRuntime)?;
        let mut loops = self.loops.lock();
        if loops.is_some() {
            return Err(ManagerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(self.registry.len() + 1);

        let monitor = HealthMonitor::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.shared.factory),
            HealthPolicy::from(&self.config.health),
        );
        handles.push(("health-monitor".to_string(), handle.spawn(monitor.run(cancel.child_token()))));

        let settings = DispatchSettings::from(&self.config);
        for instance in self.registry.all() {
            let name = format!("dispatcher-{}", instance.id());
            let dispatcher = Dispatcher::new(instance, self.shared.clone(), settings);
            handles.push((name, handle.spawn(dispatcher.run(cancel.child_token()))));
        }

        info!(instances = self.registry.len(), "monitoring started");
        *loops = Some(Loops { cancel, handles });
        Ok(())
    }

    /// Whether the background loops are running.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.loops.lock().is_some()
    }

    /// Cancel every loop and wait for each, up to the shutdown timeout per
    /// loop. Returns `true` if all loops exited in time. A no-op returning
    /// `true` when not running.
    pub async fn stop_monitoring(&self) -> bool {
        let Some(Loops { cancel, handles }) = self.loops.lock().take() else {
            return true;
        };
        cancel.cancel();

        let limit = self.config.shutdown_timeout();
        let mut clean = true;
        for (name, handle) in handles {
            match tokio::time::timeout(limit, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(loop_name = %name, error = %e, "loop ended abnormally");
                    clean = false;
                }
                Err(_) => {
                    warn!(loop_name = %name, timeout_ms = self.config.shutdown_timeout_ms, "loop did not stop in time");
                    clean = false;
                }
            }
        }
        info!(clean, "monitoring stopped");
        clean
    }

    /// Queue a pending task. Returns its id.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the task is not pending, `DuplicateTask` if its id
    /// was already submitted to this manager, `QueueFull` if the queue is
    /// bounded and full.
    pub fn submit_task(&self, task: Task) -> Result<TaskId, ManagerError> {
        if task.status != TaskStatus::Pending {
            return Err(ManagerError::InvalidConfig(format!(
                "task `{}` is {}, only pending tasks can be queued",
                task.id, task.status
            )));
        }
        let id = task.id.clone();
        let mut submitted = self.submitted.lock();
        if !submitted.insert(id.clone()) {
            return Err(ManagerError::DuplicateTask(id));
        }
        if let Err(e) = self.shared.queue.push(task) {
            submitted.remove(&id);
            return Err(e);
        }
        drop(submitted);
        info!(task = %id, queue_size = self.shared.queue.len(), "task submitted");
        Ok(id)
    }

    /// Build and queue a task from a submission.
    ///
    /// # Errors
    ///
    /// As [`submit_task`](Self::submit_task).
    pub fn submit(&self, submission: TaskSubmission) -> Result<TaskId, ManagerError> {
        self.submit_task(submission.into_task())
    }

    /// Tasks waiting in the queue.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Registered instances in registration order.
    #[must_use]
    pub fn instances(&self) -> Vec<Arc<WorkerInstance>> {
        self.registry.all()
    }

    /// A registered instance by id.
    #[must_use]
    pub fn instance(&self, id: &str) -> Option<Arc<WorkerInstance>> {
        self.registry.get(id)
    }

    /// Best-effort cluster snapshot.
    #[must_use]
    pub fn status(&self) -> ClusterStatus {
        let LogCounts { completed, failed } = self.shared.log.counts();
        ClusterStatus {
            monitoring: self.is_monitoring(),
            instances: self
                .registry
                .all()
                .iter()
                .map(|i| InstanceStatus::from(i.as_ref()))
                .collect(),
            queue_size: self.shared.queue.len(),
            completed_tasks: completed,
            failed_tasks: failed,
        }
    }

    /// Finished tasks in completion order.
    #[must_use]
    pub fn completed_tasks(&self) -> Vec<Task> {
        self.shared.log.snapshot()
    }

    /// A finished task by id.
    #[must_use]
    pub fn task(&self, id: &str) -> Option<Task> {
        self.shared.log.get(id)
    }

    /// Wait until task `id` is finished.
    ///
    /// # Errors
    ///
    /// `Timeout` if it does not finish within `timeout`.
    pub async fn wait_for_task(&self, id: &str, timeout: Duration) -> Result<Task, ManagerError> {
        let log = Arc::clone(&self.shared.log);
        self.wait_until(timeout, move || log.get(id)).await
    }

    /// Wait until at least `n` tasks are finished. Returns the counts seen.
    ///
    /// # Errors
    ///
    /// `Timeout` if fewer than `n` tasks finish within `timeout`.
    pub async fn wait_for_finished(&self, n: usize, timeout: Duration) -> Result<LogCounts, ManagerError> {
        let log: Arc<dyn CompletedTaskLog> = Arc::clone(&self.shared.log);
        self.wait_until(timeout, move || {
            let counts = log.counts();
            (counts.total() >= n).then_some(counts)
        })
        .await
    }

    async fn wait_until<T, F>(&self, timeout: Duration, check: F) -> Result<T, ManagerError>
    where
        F: Fn() -> Option<T>,
    {
        let finished = Arc::clone(&self.shared.finished);
        let wait = async {
            loop {
                let notified = finished.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if let Some(value) = check() {
                    return value;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ManagerError::Timeout)
    }
}

impl Drop for ClusterManager {
    fn drop(&mut self) {
        // Signal only; joining needs an async context.
        if let Some(loops) = self.loops.get_mut().take() {
            loops.cancel.cancel();
        }
    }
}
