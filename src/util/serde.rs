//! Identifier types shared across the crate.

/// Unique task identifier (UUID v4 string for tasks created with `Task::new`).
pub type TaskId = String;

/// Worker instance identifier, chosen by whoever registers the instance.
pub type InstanceId = String;

/// Generate a fresh task identifier.
#[must_use]
pub fn new_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}
