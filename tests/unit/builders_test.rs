//! Tests for manager builders

use std::sync::Arc;

use prometheus_mcp_cluster::builders::ManagerBuilder;
use prometheus_mcp_cluster::config::ManagerConfig;
use prometheus_mcp_cluster::core::{ManagerError, Task};
use prometheus_mcp_cluster::infra::{CompletedTaskLog, InMemoryQueue, InMemoryTaskLog, TaskQueue};

#[test]
fn test_builder_uses_supplied_queue() {
    let queue = Arc::new(InMemoryQueue::bounded(2));
    let manager = ManagerBuilder::new(ManagerConfig::default())
        .queue(queue.clone())
        .completed_log(Arc::new(InMemoryTaskLog::new()))
        .build()
        .unwrap();

    manager.submit_task(Task::new("a", "", vec![])).unwrap();
    manager.submit_task(Task::new("b", "", vec![])).unwrap();
    assert!(matches!(
        manager.submit_task(Task::new("c", "", vec![])),
        Err(ManagerError::QueueFull(_))
    ));
    assert_eq!(queue.len(), 2);
    assert_eq!(manager.status().queue_size, 2);
}

#[test]
fn test_builder_exposes_config() {
    let mut cfg = ManagerConfig::default();
    cfg.max_concurrent_per_instance = 4;
    let builder = ManagerBuilder::new(cfg);
    assert_eq!(builder.config().max_concurrent_per_instance, 4);

    let manager = builder.build().unwrap();
    assert_eq!(manager.config().max_concurrent_per_instance, 4);
    assert!(manager.completed_tasks().is_empty());
}

#[test]
fn test_manager_from_config_registers_instances() {
    let cfg = ManagerConfig::from_json_str(
        r#"{ "instances": [{ "id": "w1", "url": "http://localhost:9001/mcp" }] }"#,
    )
    .unwrap();
    let manager = prometheus_mcp_cluster::core::ClusterManager::new(cfg).unwrap();
    assert_eq!(manager.instances().len(), 1);

    let log = InMemoryTaskLog::new();
    assert!(log.is_empty());
}
