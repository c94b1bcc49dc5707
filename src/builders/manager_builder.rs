//! Fluent construction of [`ClusterManager`].

use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::ManagerConfig;
use crate::core::dispatcher::DispatchShared;
use crate::core::{ActionExecutor, ClusterManager, ManagerError, WorkerRegistry};
use crate::infra::{ArtifactStore, CompletedTaskLog, InMemoryQueue, InMemoryTaskLog, TaskQueue};
use crate::protocol::{ClientFactory, McpClientFactory};

/// Assembles a [`ClusterManager`] with pluggable collaborators.
///
/// Anything not supplied falls back to the in-memory queue and log, the HTTP
/// client factory, and no artifact archiving.
pub struct ManagerBuilder {
    config: ManagerConfig,
    factory: Option<Arc<dyn ClientFactory>>,
    store: Option<Arc<dyn ArtifactStore>>,
    queue: Option<Arc<dyn TaskQueue>>,
    log: Option<Arc<dyn CompletedTaskLog>>,
}

impl ManagerBuilder {
    /// Start from `config`.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            factory: None,
            store: None,
            queue: None,
            log: None,
        }
    }

    /// Configuration the manager will be built with.
    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Client factory used by the monitor and dispatchers.
    #[must_use]
    pub fn client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Archive screenshots and snapshots into `store`.
    #[must_use]
    pub fn artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Task queue backend. Replaces the `max_queue_depth` bound.
    #[must_use]
    pub fn queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Completed-task log backend.
    #[must_use]
    pub fn completed_log(mut self, log: Arc<dyn CompletedTaskLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Validate the configuration and build the manager with its configured
    /// instances registered.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if validation fails.
    pub fn build(self) -> Result<ClusterManager, ManagerError> {
        self.config.validate().map_err(ManagerError::InvalidConfig)?;

        let registry = Arc::new(WorkerRegistry::new());
        for instance in &self.config.instances {
            registry.register(instance.id.clone(), instance.url.clone())?;
        }

        let factory: Arc<dyn ClientFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(McpClientFactory::new(self.config.client.clone())),
        };
        let queue: Arc<dyn TaskQueue> = match self.queue {
            Some(queue) => queue,
            None => Arc::new(InMemoryQueue::with_max_depth(self.config.max_queue_depth)),
        };
        let log: Arc<dyn CompletedTaskLog> = match self.log {
            Some(log) => log,
            None => Arc::new(InMemoryTaskLog::new()),
        };
        let executor = self
            .store
            .map_or_else(ActionExecutor::new, ActionExecutor::with_store);

        let shared = DispatchShared {
            queue,
            log,
            factory,
            executor,
            finished: Arc::new(Notify::new()),
        };
        Ok(ClusterManager::from_parts(self.config, registry, shared))
    }
}
