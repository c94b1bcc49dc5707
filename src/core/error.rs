//! Error types for cluster management and the worker protocol client.

use thiserror::Error;

/// Errors produced by the cluster manager and its queue backends.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Queue is full; the task was not accepted.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An instance with the same identifier is already registered.
    #[error("duplicate instance: {0}")]
    DuplicateInstance(String),
    /// A task with the same identifier was already submitted.
    #[error("duplicate task: {0}")]
    DuplicateTask(String),
    /// Instances cannot be registered while monitoring is running.
    #[error("monitoring already running")]
    AlreadyRunning,
    /// Background loops need a Tokio runtime to spawn on.
    #[error("no tokio runtime available")]
    NoRuntime,
    /// Waiting for a task or batch outcome timed out.
    #[error("operation timed out")]
    Timeout,
}

/// Failure causes observed by the protocol client.
///
/// The public [`WorkerClient`](crate::protocol::WorkerClient) surface collapses
/// every variant into a single "no result" signal; the variants survive in the
/// concrete client's `try_*` methods and in log output.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, timeout, or other HTTP transport failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with an unexpected HTTP status.
    #[error("unexpected http status: {0}")]
    HttpStatus(u16),
    /// The JSON-RPC envelope carried an `error` member.
    #[error("protocol error: {message}")]
    Protocol {
        /// JSON-RPC error code, when present and numeric.
        code: Option<i64>,
        /// Error message reported by the worker.
        message: String,
    },
    /// The capability ran but flagged `isError`.
    #[error("tool execution error: {0}")]
    ToolExecution(String),
    /// The response body could not be decoded into a JSON-RPC envelope.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// The client was closed before the call.
    #[error("client closed")]
    Closed,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
