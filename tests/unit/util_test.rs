//! Tests for utility functions

use prometheus_mcp_cluster::util::{filter_for, init_tracing, new_task_id, now_ms, DEFAULT_FILTER};

#[test]
fn test_task_ids_are_unique_uuids() {
    let a = new_task_id();
    let b = new_task_id();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn test_now_ms_is_recent() {
    // 2020-01-01 in ms.
    assert!(now_ms() > 1_577_836_800_000);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    assert!(!init_tracing());
}

#[test]
fn test_filter_falls_back_to_crate_default() {
    assert_eq!(filter_for(None).to_string(), DEFAULT_FILTER);
    assert_eq!(filter_for(Some("  ")).to_string(), DEFAULT_FILTER);
    assert_eq!(filter_for(Some("debug")).to_string(), "debug");
}
