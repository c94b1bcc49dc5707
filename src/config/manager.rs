//! Cluster manager configuration structures.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A worker endpoint to register at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Instance identifier, unique within the cluster.
    pub id: String,
    /// JSON-RPC endpoint URL (e.g. `http://localhost:9001/mcp`).
    pub url: String,
}

/// Health monitor schedule and failure thresholds. All durations in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Base period of the monitor loop.
    pub tick_interval_ms: u64,
    /// Probe interval for instances in the `unknown` state.
    pub unknown_interval_ms: u64,
    /// Probe interval for instances in the `unhealthy` state.
    pub unhealthy_interval_ms: u64,
    /// Probe interval for instances in the `healthy` state.
    pub healthy_interval_ms: u64,
    /// Consecutive failures tolerated before a healthy instance is condemned.
    pub healthy_failure_threshold: u32,
    /// Consecutive failures that keep an unhealthy instance flagged.
    pub unhealthy_failure_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            unknown_interval_ms: 10_000,
            unhealthy_interval_ms: 15_000,
            healthy_interval_ms: 30_000,
            healthy_failure_threshold: 5,
            unhealthy_failure_threshold: 3,
        }
    }
}

/// Dispatcher pacing. All durations in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Sleep when the queue is empty.
    pub idle_backoff_ms: u64,
    /// Sleep when the bound instance is unhealthy or at capacity.
    pub busy_backoff_ms: u64,
    /// Sleep after an unexpected failure inside a loop iteration.
    pub error_backoff_ms: u64,
    /// Upper bound on the action phase of one task. `None` leaves tasks
    /// bounded only by the per-request transport timeouts.
    pub task_timeout_ms: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: 1_000,
            busy_backoff_ms: 2_000,
            error_backoff_ms: 5_000,
            task_timeout_ms: None,
        }
    }
}

/// Protocol client identity and per-request timeouts (milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Protocol version announced during `initialize`.
    pub protocol_version: String,
    /// Client name announced during `initialize`.
    pub client_name: String,
    /// Client version announced during `initialize`.
    pub client_version: String,
    /// Timeout for the handshake request.
    pub initialize_timeout_ms: u64,
    /// Timeout for the `notifications/initialized` post.
    pub notify_timeout_ms: u64,
    /// Timeout for the raw connectivity probe.
    pub raw_probe_timeout_ms: u64,
    /// Timeout for the handshake and listing probe tiers.
    pub probe_rpc_timeout_ms: u64,
    /// Timeout for `tools/list`.
    pub list_timeout_ms: u64,
    /// Timeout for `tools/call`.
    pub call_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol_version: "2025-06-18".into(),
            client_name: "mcp-manager".into(),
            client_version: "1.0".into(),
            initialize_timeout_ms: 10_000,
            notify_timeout_ms: 5_000,
            raw_probe_timeout_ms: 2_000,
            probe_rpc_timeout_ms: 3_000,
            list_timeout_ms: 10_000,
            call_timeout_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Handshake timeout as a `Duration`.
    #[must_use]
    pub const fn initialize_timeout(&self) -> Duration {
        Duration::from_millis(self.initialize_timeout_ms)
    }

    /// Notification timeout as a `Duration`.
    #[must_use]
    pub const fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    /// Raw probe timeout as a `Duration`.
    #[must_use]
    pub const fn raw_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.raw_probe_timeout_ms)
    }

    /// RPC probe timeout as a `Duration`.
    #[must_use]
    pub const fn probe_rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_rpc_timeout_ms)
    }

    /// Listing timeout as a `Duration`.
    #[must_use]
    pub const fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }

    /// Call timeout as a `Duration`.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    fn validate(&self) -> Result<(), String> {
        let timeouts = [
            ("initialize_timeout_ms", self.initialize_timeout_ms),
            ("notify_timeout_ms", self.notify_timeout_ms),
            ("raw_probe_timeout_ms", self.raw_probe_timeout_ms),
            ("probe_rpc_timeout_ms", self.probe_rpc_timeout_ms),
            ("list_timeout_ms", self.list_timeout_ms),
            ("call_timeout_ms", self.call_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(format!("client.{name} must be greater than 0"));
            }
        }
        if self.protocol_version.trim().is_empty() {
            return Err("client.protocol_version must not be empty".into());
        }
        Ok(())
    }
}

/// Root cluster manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Maximum concurrently active tasks per instance.
    pub max_concurrent_per_instance: u32,
    /// Maximum queued tasks before rejection; `None` is unbounded.
    pub max_queue_depth: Option<usize>,
    /// How long shutdown waits for each background loop.
    pub shutdown_timeout_ms: u64,
    /// Health monitor settings.
    pub health: HealthConfig,
    /// Dispatcher settings.
    pub dispatch: DispatchConfig,
    /// Protocol client settings.
    pub client: ClientConfig,
    /// Instances registered when the manager is built.
    pub instances: Vec<InstanceConfig>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_instance: 1,
            max_queue_depth: None,
            shutdown_timeout_ms: 5_000,
            health: HealthConfig::default(),
            dispatch: DispatchConfig::default(),
            client: ClientConfig::default(),
            instances: Vec::new(),
        }
    }
}

impl HealthConfig {
    fn validate(&self) -> Result<(), String> {
        let intervals = [
            ("tick_interval_ms", self.tick_interval_ms),
            ("unknown_interval_ms", self.unknown_interval_ms),
            ("unhealthy_interval_ms", self.unhealthy_interval_ms),
            ("healthy_interval_ms", self.healthy_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(format!("health.{name} must be greater than 0"));
            }
        }
        if self.healthy_failure_threshold == 0 || self.unhealthy_failure_threshold == 0 {
            return Err("health failure thresholds must be greater than 0".into());
        }
        Ok(())
    }
}

impl DispatchConfig {
    fn validate(&self) -> Result<(), String> {
        if self.idle_backoff_ms == 0 || self.busy_backoff_ms == 0 || self.error_backoff_ms == 0 {
            return Err("dispatch backoffs must be greater than 0".into());
        }
        if self.task_timeout_ms == Some(0) {
            return Err("dispatch.task_timeout_ms must be greater than 0 when set".into());
        }
        Ok(())
    }
}

impl ManagerConfig {
    /// Shutdown join timeout as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate all values and the instance list.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_per_instance == 0 {
            return Err("max_concurrent_per_instance must be greater than 0".into());
        }
        if self.max_queue_depth == Some(0) {
            return Err("max_queue_depth must be greater than 0 when set".into());
        }
        if self.shutdown_timeout_ms == 0 {
            return Err("shutdown_timeout_ms must be greater than 0".into());
        }
        self.health.validate()?;
        self.dispatch.validate()?;
        self.client.validate()?;

        let mut seen = HashSet::new();
        for instance in &self.instances {
            validate_instance(instance)?;
            if !seen.insert(instance.id.as_str()) {
                return Err(format!("instance `{}` defined more than once", instance.id));
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns an error string on parse failure or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults plus environment overrides.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// # Errors
    ///
    /// Returns an error string if an override cannot be parsed or the result
    /// is invalid.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `MCP_CLUSTER_*` overrides read through `lookup`.
    ///
    /// `MCP_CLUSTER_INSTANCES` is a comma-separated list of `id=url` pairs and
    /// replaces the instance list.
    ///
    /// # Errors
    ///
    /// Returns an error string naming the variable that failed to parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MCP_CLUSTER_MAX_CONCURRENT") {
            self.max_concurrent_per_instance = parse_var("MCP_CLUSTER_MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = lookup("MCP_CLUSTER_MAX_QUEUE_DEPTH") {
            self.max_queue_depth = Some(parse_var("MCP_CLUSTER_MAX_QUEUE_DEPTH", &v)?);
        }
        if let Some(v) = lookup("MCP_CLUSTER_SHUTDOWN_TIMEOUT_MS") {
            self.shutdown_timeout_ms = parse_var("MCP_CLUSTER_SHUTDOWN_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("MCP_CLUSTER_TASK_TIMEOUT_MS") {
            self.dispatch.task_timeout_ms = Some(parse_var("MCP_CLUSTER_TASK_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("MCP_CLUSTER_INSTANCES") {
            self.instances = parse_instances(&v)?;
        }
        Ok(())
    }
}

fn validate_instance(instance: &InstanceConfig) -> Result<(), String> {
    if instance.id.trim().is_empty() {
        return Err("instance id must not be empty".into());
    }
    if !(instance.url.starts_with("http://") || instance.url.starts_with("https://")) {
        return Err(format!(
            "instance `{}` url must start with http:// or https://",
            instance.id
        ));
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{name}: cannot parse `{value}`"))
}

fn parse_instances(value: &str) -> Result<Vec<InstanceConfig>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, url) = entry
                .split_once('=')
                .ok_or_else(|| format!("MCP_CLUSTER_INSTANCES: expected id=url, got `{entry}`"))?;
            Ok(InstanceConfig {
                id: id.trim().to_string(),
                url: url.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ManagerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.health.healthy_failure_threshold, 5);
        assert_eq!(cfg.health.unhealthy_failure_threshold, 3);
    }

    #[test]
    fn test_overrides_replace_instances() {
        let vars: HashMap<&str, &str> = [
            ("MCP_CLUSTER_MAX_CONCURRENT", "3"),
            ("MCP_CLUSTER_INSTANCES", "a=http://localhost:9001/mcp, b=http://localhost:9002/mcp"),
        ]
        .into_iter()
        .collect();

        let mut cfg = ManagerConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(cfg.max_concurrent_per_instance, 3);
        assert_eq!(cfg.instances.len(), 2);
        assert_eq!(cfg.instances[1].id, "b");
        assert_eq!(cfg.instances[1].url, "http://localhost:9002/mcp");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_override_parse_error_names_variable() {
        let mut cfg = ManagerConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == "MCP_CLUSTER_TASK_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.contains("MCP_CLUSTER_TASK_TIMEOUT_MS"));
    }
}
