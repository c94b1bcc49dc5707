//! Tasks, actions, and their outcomes.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::clock::now_ms;
use crate::util::serde::{new_task_id, InstanceId, TaskId};

/// Lifecycle of a task. Transitions only move forward:
/// `Pending -> Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, not yet claimed.
    Pending,
    /// Claimed by a dispatcher.
    Running,
    /// Every action succeeded.
    Completed,
    /// At least one action failed, or the task could not start.
    Failed,
}

impl TaskStatus {
    /// Whether the task has left `Running`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn default_click_element() -> String {
    "element".into()
}

fn default_type_element() -> String {
    "input".into()
}

const fn default_wait_secs() -> f64 {
    1.0
}

/// One step of a task, tagged by `type` on the wire.
///
/// A `type` outside the known set deserializes to [`Action::Unknown`] with
/// the raw tag kept, instead of rejecting the whole task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Open a URL.
    Navigate {
        /// Target URL.
        url: String,
    },
    /// Capture the page as an image.
    Screenshot {
        /// Optional artifact name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// Capture the page structure.
    Snapshot {
        /// Optional artifact base name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// Click an element.
    Click {
        /// Human-readable element description.
        #[serde(default = "default_click_element")]
        element: String,
        /// Element reference from a snapshot.
        #[serde(rename = "ref")]
        reference: String,
    },
    /// Type text into an element.
    Type {
        /// Human-readable element description.
        #[serde(default = "default_type_element")]
        element: String,
        /// Element reference from a snapshot.
        #[serde(rename = "ref")]
        reference: String,
        /// Text to type.
        text: String,
    },
    /// Local pause, no remote call.
    Wait {
        /// Seconds to pause.
        #[serde(default = "default_wait_secs")]
        time: f64,
    },
    /// Close the current tab.
    Close,
    /// List the worker's capabilities.
    ListTools,
    /// Run the layered liveness probe.
    HealthCheck,
    /// Any action kind this crate does not know; always fails.
    #[serde(skip)]
    Unknown {
        /// The `type` tag as received.
        kind: String,
    },
}

const KNOWN_KINDS: [&str; 9] = [
    "navigate",
    "screenshot",
    "snapshot",
    "click",
    "type",
    "wait",
    "close",
    "list_tools",
    "health_check",
];

impl Serialize for Action {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unknown { kind } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", kind)?;
                map.end()
            }
            known => Self::serialize(known, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(de::Error::custom("action `type` must be a string")),
            None => return Err(de::Error::missing_field("type")),
        };
        if KNOWN_KINDS.contains(&kind.as_str()) {
            Self::deserialize(value).map_err(de::Error::custom)
        } else {
            Ok(Self::Unknown { kind })
        }
    }
}

impl Action {
    /// Wire name of the action kind; the raw tag for unknown kinds.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Screenshot { .. } => "screenshot",
            Self::Snapshot { .. } => "snapshot",
            Self::Click { .. } => "click",
            Self::Type { .. } => "type",
            Self::Wait { .. } => "wait",
            Self::Close => "close",
            Self::ListTools => "list_tools",
            Self::HealthCheck => "health_check",
            Self::Unknown { kind } => kind.as_str(),
        }
    }
}

/// Outcome of a single action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Action kind.
    pub action: String,
    /// Whether the action succeeded.
    pub success: bool,
    /// Payload on success, diagnostic on failure.
    pub data: Option<Value>,
}

impl ActionOutcome {
    /// Successful outcome with data.
    pub fn ok(action: &Action, data: Value) -> Self {
        Self {
            action: action.kind().to_string(),
            success: true,
            data: Some(data),
        }
    }

    /// Failed outcome with optional diagnostic data.
    pub fn failed(action: &Action, data: Option<Value>) -> Self {
        Self {
            action: action.kind().to_string(),
            success: false,
            data,
        }
    }
}

/// Aggregated result attached to a finished task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Whether every action succeeded.
    pub success: bool,
    /// Summary error for failed tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-action outcomes in execution order.
    #[serde(default)]
    pub results: Vec<ActionOutcome>,
}

impl TaskResult {
    /// Aggregate per-action outcomes; fails if any action failed.
    #[must_use]
    pub fn from_outcomes(results: Vec<ActionOutcome>) -> Self {
        let failed = results.iter().filter(|r| !r.success).count();
        if failed == 0 {
            Self {
                success: true,
                error: None,
                results,
            }
        } else {
            Self {
                success: false,
                error: Some(format!("partial failure: {failed}/{} actions failed", results.len())),
                results,
            }
        }
    }

    /// Failed result that ran no actions.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            results: Vec::new(),
        }
    }

    /// Failed result carrying whatever outcomes were collected.
    pub fn failure_with(error: impl Into<String>, results: Vec<ActionOutcome>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            results,
        }
    }
}

/// A unit of work: an ordered action sequence run on one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,
    /// Display name.
    pub name: String,
    /// Target resource; may be empty for non-navigational tasks.
    #[serde(default)]
    pub url: String,
    /// Actions, run in order.
    pub actions: Vec<Action>,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Result, set when the task finishes.
    pub result: Option<TaskResult>,
    /// Claim time (ms since epoch).
    pub start_time_ms: Option<u128>,
    /// Finish time (ms since epoch).
    pub end_time_ms: Option<u128>,
    /// Instance that claimed the task; set once, never cleared.
    pub assigned_instance: Option<InstanceId>,
}

impl Task {
    /// Create a pending task with a fresh identifier.
    pub fn new(name: impl Into<String>, url: impl Into<String>, actions: Vec<Action>) -> Self {
        Self::with_id(new_task_id(), name, url, actions)
    }

    /// Create a pending task with a caller-chosen identifier.
    pub fn with_id(
        id: impl Into<TaskId>,
        name: impl Into<String>,
        url: impl Into<String>,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            actions,
            status: TaskStatus::Pending,
            result: None,
            start_time_ms: None,
            end_time_ms: None,
            assigned_instance: None,
        }
    }

    /// Move `Pending -> Running`, stamping the start time and assignment.
    ///
    /// Returns `false` and leaves the task untouched if it is not pending.
    pub fn mark_running(&mut self, instance: &str) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        self.start_time_ms = Some(now_ms());
        self.assigned_instance = Some(instance.to_string());
        true
    }

    /// Move `Running -> Completed | Failed` according to `result.success`.
    ///
    /// Returns `false` and leaves the task untouched if it is not running.
    pub fn finish(&mut self, result: TaskResult) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = if result.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        self.end_time_ms = Some(now_ms());
        self.result = Some(result);
        true
    }

    /// Wall time between claim and finish, when both are known.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u128> {
        Some(self.end_time_ms?.saturating_sub(self.start_time_ms?))
    }
}
