//! Configuration models for the manager, health monitor, dispatchers, and client.

pub mod manager;

pub use manager::{ClientConfig, DispatchConfig, HealthConfig, InstanceConfig, ManagerConfig};
