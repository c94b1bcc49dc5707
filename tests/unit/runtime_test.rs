//! Tests for API models

use prometheus_mcp_cluster::core::{Action, TaskStatus, WorkerInstance, WorkerStatus};
use prometheus_mcp_cluster::runtime::{ClusterStatus, InstanceStatus, TaskSubmission};
use serde_json::json;

#[test]
fn test_submission_from_json() {
    let submission: TaskSubmission = serde_json::from_value(json!({
        "task_id": "t-1",
        "name": "search",
        "url": "https://example.com",
        "actions": [
            { "type": "navigate", "url": "https://example.com" },
            { "type": "type", "ref": "e7", "text": "rust" },
            { "type": "screenshot", "filename": "results.png" }
        ]
    }))
    .unwrap();

    let task = submission.into_task();
    assert_eq!(task.id, "t-1");
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.actions.len(), 3);
    assert_eq!(
        task.actions[2],
        Action::Screenshot { filename: Some("results.png".into()) }
    );
}

#[test]
fn test_submission_without_id_gets_one() {
    let submission = TaskSubmission {
        task_id: None,
        name: "noop".into(),
        url: String::new(),
        actions: vec![Action::Wait { time: 0.0 }],
    };
    assert!(!submission.into_task().id.is_empty());
}

#[test]
fn test_status_serialization() {
    let instance = WorkerInstance::new("w1", "http://localhost:9001/mcp");
    let status = ClusterStatus {
        monitoring: false,
        instances: vec![InstanceStatus::from(&instance)],
        queue_size: 3,
        completed_tasks: 1,
        failed_tasks: 0,
    };
    assert_eq!(status.healthy_instances(), 0);
    assert_eq!(status.active_tasks(), 0);

    let value = serde_json::to_value(&status).unwrap();
    assert_eq!(value["instances"][0]["status"], json!("unknown"));
    assert_eq!(value["instances"][0]["session_id"], json!(null));
    assert_eq!(value["queue_size"], json!(3));
    assert_eq!(instance.status(), WorkerStatus::Unknown);
}
