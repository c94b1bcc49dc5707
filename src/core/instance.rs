//! Worker instances and the registry that holds them.
//!
//! Every mutable field has exactly one writer:
//! - `status`, `last_check_ms`, `health_check_failures`, `session_id`: the health monitor
//! - `active_tasks`, `completed_tasks`, `failed_tasks`: the instance's dispatcher
//!
//! Fields are lock-free atomics so any thread can read them; a snapshot that
//! spans several fields may be torn and is best-effort status only.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::ManagerError;
use crate::util::serde::InstanceId;

/// Health status of a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Never probed.
    Unknown,
    /// Accepting work.
    Healthy,
    /// Failing probes; dispatch is paused.
    Unhealthy,
}

impl WorkerStatus {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Healthy => 1,
            Self::Unhealthy => 2,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Healthy,
            2 => Self::Unhealthy,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// A remote worker endpoint and its health/load counters.
#[derive(Debug)]
pub struct WorkerInstance {
    id: InstanceId,
    url: String,
    status: AtomicU8,
    last_check_ms: AtomicU64,
    active_tasks: AtomicU32,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
    health_check_failures: AtomicU32,
    session_id: RwLock<Option<String>>,
}

impl WorkerInstance {
    /// Create an instance in the `Unknown` state.
    pub fn new(id: impl Into<InstanceId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            status: AtomicU8::new(WorkerStatus::Unknown.as_u8()),
            last_check_ms: AtomicU64::new(0),
            active_tasks: AtomicU32::new(0),
            completed_tasks: AtomicU64::new(0),
            failed_tasks: AtomicU64::new(0),
            health_check_failures: AtomicU32::new(0),
            session_id: RwLock::new(None),
        }
    }

    /// Instance identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current health status.
    #[must_use]
    pub fn status(&self) -> WorkerStatus {
        WorkerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Whether the instance is `Healthy`.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status() == WorkerStatus::Healthy
    }

    /// Time of the last probe attempt (ms since epoch, 0 = never).
    #[must_use]
    pub fn last_check_ms(&self) -> u64 {
        self.last_check_ms.load(Ordering::Acquire)
    }

    /// Tasks currently executing on this instance.
    #[must_use]
    pub fn active_tasks(&self) -> u32 {
        self.active_tasks.load(Ordering::Acquire)
    }

    /// Tasks finished successfully.
    #[must_use]
    pub fn completed_tasks(&self) -> u64 {
        self.completed_tasks.load(Ordering::Relaxed)
    }

    /// Tasks finished with a failure.
    #[must_use]
    pub fn failed_tasks(&self) -> u64 {
        self.failed_tasks.load(Ordering::Relaxed)
    }

    /// Consecutive failed health checks.
    #[must_use]
    pub fn health_check_failures(&self) -> u32 {
        self.health_check_failures.load(Ordering::Acquire)
    }

    /// Session token from the last successful monitor handshake.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    // Health monitor writes.

    pub(crate) fn set_health(&self, status: WorkerStatus, failures: u32) {
        self.health_check_failures.store(failures, Ordering::Release);
        self.status.store(status.as_u8(), Ordering::Release);
    }

    pub(crate) fn set_last_check_ms(&self, at_ms: u64) {
        self.last_check_ms.store(at_ms, Ordering::Release);
    }

    pub(crate) fn set_session_id(&self, session: Option<String>) {
        *self.session_id.write() = session;
    }

    // Dispatcher writes.

    /// Take one execution slot if below `limit`.
    ///
    /// Only the owning dispatcher acquires slots, so a successful check is
    /// never invalidated by another acquirer.
    pub(crate) fn try_acquire_slot(&self, limit: u32) -> bool {
        let mut current = self.active_tasks.load(Ordering::Acquire);
        loop {
            if current >= limit {
                return false;
            }
            match self.active_tasks.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn release_slot(&self) {
        let _ = self
            .active_tasks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub(crate) fn record_outcome(&self, success: bool) {
        if success {
            self.completed_tasks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_tasks.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Releases an execution slot when dropped, including during unwinding.
pub(crate) struct SlotGuard {
    instance: Arc<WorkerInstance>,
}

impl SlotGuard {
    /// Acquire a slot on `instance`, or `None` if it is at `limit`.
    pub(crate) fn acquire(instance: &Arc<WorkerInstance>, limit: u32) -> Option<Self> {
        instance.try_acquire_slot(limit).then(|| Self {
            instance: Arc::clone(instance),
        })
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.instance.release_slot();
    }
}

/// Insertion-ordered set of worker instances.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    instances: RwLock<Vec<Arc<WorkerInstance>>>,
}

impl WorkerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new instance.
    ///
    /// # Errors
    ///
    /// `DuplicateInstance` if the id is already present.
    pub fn register(
        &self,
        id: impl Into<InstanceId>,
        url: impl Into<String>,
    ) -> Result<Arc<WorkerInstance>, ManagerError> {
        let id = id.into();
        let mut instances = self.instances.write();
        if instances.iter().any(|i| i.id() == id) {
            return Err(ManagerError::DuplicateInstance(id));
        }
        let instance = Arc::new(WorkerInstance::new(id, url));
        instances.push(Arc::clone(&instance));
        Ok(instance)
    }

    /// Look up an instance by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<WorkerInstance>> {
        self.instances.read().iter().find(|i| i.id() == id).cloned()
    }

    /// All instances in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<WorkerInstance>> {
        self.instances.read().clone()
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    /// Whether no instance is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_limit_is_enforced() {
        let instance = Arc::new(WorkerInstance::new("w1", "http://localhost:9001/mcp"));
        let first = SlotGuard::acquire(&instance, 2).unwrap();
        let second = SlotGuard::acquire(&instance, 2).unwrap();
        assert!(SlotGuard::acquire(&instance, 2).is_none());
        assert_eq!(instance.active_tasks(), 2);

        drop(first);
        assert_eq!(instance.active_tasks(), 1);
        drop(second);
        assert_eq!(instance.active_tasks(), 0);
    }

    #[test]
    fn test_release_never_underflows() {
        let instance = WorkerInstance::new("w1", "http://localhost:9001/mcp");
        instance.release_slot();
        assert_eq!(instance.active_tasks(), 0);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let registry = WorkerRegistry::new();
        registry.register("a", "http://localhost:9001/mcp").unwrap();
        registry.register("b", "http://localhost:9002/mcp").unwrap();
        assert!(matches!(
            registry.register("a", "http://localhost:9003/mcp"),
            Err(ManagerError::DuplicateInstance(id)) if id == "a"
        ));
        let ids: Vec<String> = registry.all().iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(registry.get("b").unwrap().status(), WorkerStatus::Unknown);
    }
}
