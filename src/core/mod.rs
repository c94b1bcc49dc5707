//! Scheduling core: data model, registry, health monitor, dispatchers, and the manager.

pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod health;
pub mod instance;
pub mod manager;
pub mod task;

pub use dispatcher::{DispatchSettings, Dispatcher, HANDSHAKE_FAILED};
pub use error::{AppResult, ClientError, ManagerError};
pub use executor::ActionExecutor;
pub use health::{HealthMonitor, HealthPolicy, HealthState};
pub use instance::{WorkerInstance, WorkerRegistry, WorkerStatus};
pub use manager::ClusterManager;
pub use task::{Action, ActionOutcome, Task, TaskResult, TaskStatus};
