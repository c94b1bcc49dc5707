//! Tests for error types

use prometheus_mcp_cluster::core::{ClientError, ManagerError};

#[test]
fn test_manager_error_display() {
    let err = ManagerError::QueueFull("max queue depth 10 reached".into());
    assert_eq!(err.to_string(), "queue full: max queue depth 10 reached");

    let err = ManagerError::DuplicateInstance("w1".into());
    assert!(err.to_string().contains("w1"));

    let err = ManagerError::DuplicateTask("t-7".into());
    assert_eq!(err.to_string(), "duplicate task: t-7");
}

#[test]
fn test_client_error_display() {
    let err = ClientError::Protocol { code: Some(-32601), message: "unknown tool".into() };
    assert_eq!(err.to_string(), "protocol error: unknown tool");
    assert_eq!(ClientError::HttpStatus(503).to_string(), "unexpected http status: 503");
    assert_eq!(ClientError::Closed.to_string(), "client closed");
}

#[test]
fn test_errors_convert_to_anyhow() {
    fn fails() -> prometheus_mcp_cluster::core::AppResult<()> {
        Err(ManagerError::Timeout.into())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<ManagerError>().is_some());
}
