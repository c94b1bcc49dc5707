//! Tests for configuration validation

use prometheus_mcp_cluster::config::{InstanceConfig, ManagerConfig};

#[test]
fn test_json_config_fills_defaults() {
    let cfg = ManagerConfig::from_json_str(
        r#"{
            "max_concurrent_per_instance": 2,
            "health": { "healthy_interval_ms": 60000 },
            "instances": [
                { "id": "w1", "url": "http://localhost:9001/mcp" },
                { "id": "w2", "url": "http://localhost:9002/mcp" }
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(cfg.max_concurrent_per_instance, 2);
    assert_eq!(cfg.health.healthy_interval_ms, 60_000);
    assert_eq!(cfg.health.unknown_interval_ms, 10_000);
    assert_eq!(cfg.dispatch.idle_backoff_ms, 1_000);
    assert_eq!(cfg.dispatch.task_timeout_ms, None);
    assert_eq!(cfg.client.protocol_version, "2025-06-18");
    assert_eq!(cfg.instances.len(), 2);
}

#[test]
fn test_duplicate_instances_rejected() {
    let mut cfg = ManagerConfig::default();
    cfg.instances = vec![
        InstanceConfig { id: "w1".into(), url: "http://localhost:9001/mcp".into() },
        InstanceConfig { id: "w1".into(), url: "http://localhost:9002/mcp".into() },
    ];
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("w1"));
}

#[test]
fn test_invalid_values_rejected() {
    let mut cfg = ManagerConfig::default();
    cfg.health.tick_interval_ms = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = ManagerConfig::default();
    cfg.dispatch.task_timeout_ms = Some(0);
    assert!(cfg.validate().is_err());

    let mut cfg = ManagerConfig::default();
    cfg.client.call_timeout_ms = 0;
    assert!(cfg.validate().unwrap_err().contains("call_timeout_ms"));

    let mut cfg = ManagerConfig::default();
    cfg.instances = vec![InstanceConfig { id: "w1".into(), url: "localhost:9001".into() }];
    assert!(cfg.validate().is_err());
}

#[test]
fn test_malformed_json_reports_parse_error() {
    let err = ManagerConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_client_durations() {
    let cfg = ManagerConfig::default();
    assert_eq!(cfg.client.initialize_timeout().as_secs(), 10);
    assert_eq!(cfg.client.raw_probe_timeout().as_secs(), 2);
    assert_eq!(cfg.client.probe_rpc_timeout().as_secs(), 3);
    assert_eq!(cfg.client.call_timeout().as_secs(), 30);
    assert_eq!(cfg.shutdown_timeout().as_secs(), 5);
}
