//! # Prometheus MCP Cluster
//!
//! Scheduling and health monitoring for a pool of remote MCP workers.
//!
//! Each worker exposes a browser-automation tool set over JSON-RPC 2.0 on
//! HTTP. The manager keeps a registry of workers, probes them on an adaptive
//! schedule, and runs one dispatcher per worker that drains a shared FIFO queue
//! of tasks while the worker is healthy and under its concurrency limit.
//!
//! ## Components
//!
//! - **Protocol client** ([`protocol`]): handshake, capability listing,
//!   invocation, and a layered liveness probe. Failures collapse to
//!   `false`/`None` at the trait boundary; the concrete client keeps a typed
//!   [`ClientError`](core::ClientError) through its `try_*` methods.
//! - **Worker registry** ([`core::instance`]): lock-free per-instance state
//!   with a single writer per field.
//! - **Health monitor** ([`core::health`]): unknown/unhealthy/healthy probe
//!   intervals of 10s/15s/30s on a 5s tick; 5 consecutive failures condemn a
//!   healthy worker, one success recovers any worker.
//! - **Dispatchers** ([`core::dispatcher`]): best-effort sequential action
//!   execution with a guaranteed slot release.
//! - **Queue, completed-task log, artifact storage** ([`infra`]).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use prometheus_mcp_cluster::config::ManagerConfig;
//! use prometheus_mcp_cluster::core::{Action, ClusterManager, Task};
//!
//! # async fn run() -> Result<(), prometheus_mcp_cluster::core::ManagerError> {
//! let manager = ClusterManager::new(ManagerConfig::default())?;
//! manager.add_instance("w1", "http://localhost:9001/mcp")?;
//! manager.start_monitoring()?;
//!
//! let id = manager.submit_task(Task::new(
//!     "homepage",
//!     "https://example.com",
//!     vec![
//!         Action::Navigate { url: "https://example.com".into() },
//!         Action::Snapshot { filename: None },
//!     ],
//! ))?;
//! let finished = manager.wait_for_task(&id, Duration::from_secs(120)).await?;
//! println!("{id}: {}", finished.status);
//!
//! manager.stop_monitoring().await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduling core: tasks, registry, health monitor, dispatchers, manager.
pub mod core;
/// Configuration models for the manager, monitor, dispatchers, and client.
pub mod config;
/// Builders to construct a manager from configuration.
pub mod builders;
/// Infrastructure adapters for the queue, completed-task log, and artifact storage.
pub mod infra;
/// Worker protocol client and JSON-RPC framing.
pub mod protocol;
/// API surface for submitters and status readers.
pub mod runtime;
/// Shared utilities.
pub mod util;
