//! Wire-level tests for McpClient against an in-process mock worker
//!
//! The mock speaks JSON-RPC over HTTP with event-stream framed replies and
//! records every request it sees, so these tests can assert on:
//! - Session token capture and echo
//! - Payload extraction precedence and failure classification
//! - Probe tier fallthrough
//! - Idempotent close

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use prometheus_mcp_cluster::config::ClientConfig;
use prometheus_mcp_cluster::core::ClientError;
use prometheus_mcp_cluster::protocol::{McpClient, WorkerClient, ACCEPT_VALUE, SESSION_HEADER};
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// MOCK WORKER
// ============================================================================

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    id: Value,
    session: Option<String>,
    accept: Option<String>,
}

struct Mock {
    root_status: StatusCode,
    rpc_status: StatusCode,
    seen: Mutex<Vec<Seen>>,
}

impl Mock {
    fn new(root_status: StatusCode, rpc_status: StatusCode) -> Arc<Self> {
        Arc::new(Self {
            root_status,
            rpc_status,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }
}

fn sse(body: &Value) -> String {
    format!("event: message\ndata: {body}\n\n")
}

fn tool_reply(id: &Value, name: &str) -> String {
    let result = match name {
        "structured" => json!({
            "structuredContent": { "title": "Example Domain" },
            "content": [{ "type": "text", "text": "ignored" }]
        }),
        "text" => json!({
            "content": [
                { "type": "text", "text": "first" },
                { "type": "text", "text": "second" }
            ]
        }),
        "fails" => json!({
            "isError": true,
            "content": [{ "type": "text", "text": "element not found" }]
        }),
        "rpc_error" => {
            return sse(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "unknown tool" }
            }))
        }
        "garbage" => return "data: definitely not json\n\n".to_string(),
        _ => json!({ "content": [] }),
    };
    sse(&json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

async fn rpc(State(mock): State<Arc<Mock>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    mock.seen.lock().push(Seen {
        method: method.clone(),
        id: id.clone(),
        session: headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        accept: headers
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if mock.rpc_status != StatusCode::OK {
        return mock.rpc_status.into_response();
    }

    match method.as_str() {
        "initialize" => {
            let body = sse(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": body["params"]["protocolVersion"],
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "mock", "version": "0.0.1" }
                }
            }));
            (StatusCode::OK, [(SESSION_HEADER, "abc123")], body).into_response()
        }
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        "tools/list" => sse(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "tools": [
                { "name": "browser_navigate", "description": "Navigate to a URL" },
                { "name": "browser_snapshot", "description": "Capture page", "inputSchema": { "type": "object" } }
            ]}
        }))
        .into_response(),
        "tools/call" => {
            let name = body["params"]["name"].as_str().unwrap_or_default();
            tool_reply(&id, name).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn root(State(mock): State<Arc<Mock>>) -> StatusCode {
    mock.root_status
}

async fn spawn_worker(mock: Arc<Mock>) -> String {
    let app = Router::new()
        .route("/", get(root))
        .route("/mcp", post(rpc))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/mcp")
}

async fn closed_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/mcp")
}

fn client(endpoint: &str) -> McpClient {
    McpClient::new(endpoint, ClientConfig::default())
}

// ============================================================================
// SESSION TESTS
// ============================================================================

#[tokio::test]
async fn test_session_token_is_echoed_after_handshake() {
    let mock = Mock::new(StatusCode::NOT_FOUND, StatusCode::OK);
    let endpoint = spawn_worker(Arc::clone(&mock)).await;
    let mut client = client(&endpoint);

    assert!(client.open().await);
    assert_eq!(client.session_id(), Some("abc123"));

    let tools = client.list_capabilities().await.unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[1].input_schema, Some(json!({ "type": "object" })));
    assert!(client.invoke("structured", json!({})).await.is_some());

    let seen = mock.seen();
    let methods: Vec<&str> = seen.iter().map(|s| s.method.as_str()).collect();
    assert_eq!(
        methods,
        vec!["initialize", "notifications/initialized", "tools/list", "tools/call"]
    );

    assert_eq!(seen[0].id, json!(1));
    assert!(seen[0].session.is_none());
    assert_eq!(seen[0].accept.as_deref(), Some(ACCEPT_VALUE));
    assert_eq!(seen[1].id, Value::Null);
    for request in &seen[1..] {
        assert_eq!(request.session.as_deref(), Some("abc123"), "{}", request.method);
    }
    assert!(seen[2].id.is_string());
    assert!(seen[3].id.is_string());
}

#[tokio::test]
async fn test_handshake_rejects_non_200() {
    let mock = Mock::new(StatusCode::NOT_FOUND, StatusCode::INTERNAL_SERVER_ERROR);
    let endpoint = spawn_worker(mock).await;
    let mut client = client(&endpoint);

    assert!(matches!(client.try_open().await, Err(ClientError::HttpStatus(500))));
    assert!(client.session_id().is_none());
    assert!(!client.open().await);
}

// ============================================================================
// INVOCATION TESTS
// ============================================================================

#[tokio::test]
async fn test_invoke_payload_precedence() {
    let mock = Mock::new(StatusCode::NOT_FOUND, StatusCode::OK);
    let endpoint = spawn_worker(mock).await;
    let mut client = client(&endpoint);
    assert!(client.open().await);

    assert_eq!(
        client.invoke("structured", json!({})).await,
        Some(json!({ "title": "Example Domain" }))
    );
    assert_eq!(
        client.invoke("text", json!({})).await,
        Some(json!({ "text": "first\nsecond" }))
    );
    assert_eq!(
        client.invoke("empty", json!({})).await,
        Some(json!({ "content": [] }))
    );
}

#[tokio::test]
async fn test_invoke_failure_causes_are_distinguishable() {
    let mock = Mock::new(StatusCode::NOT_FOUND, StatusCode::OK);
    let endpoint = spawn_worker(mock).await;
    let mut client = client(&endpoint);
    assert!(client.open().await);

    assert!(matches!(
        client.try_invoke("fails", json!({})).await,
        Err(ClientError::ToolExecution(_))
    ));
    match client.try_invoke("rpc_error", json!({})).await {
        Err(ClientError::Protocol { code, message }) => {
            assert_eq!(code, Some(-32601));
            assert_eq!(message, "unknown tool");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert!(matches!(
        client.try_invoke("garbage", json!({})).await,
        Err(ClientError::MalformedResponse(_))
    ));

    // The trait surface collapses every cause to None.
    for name in ["fails", "rpc_error", "garbage"] {
        assert!(client.invoke(name, json!({})).await.is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_unreachable_worker_is_transport_error() {
    let endpoint = closed_endpoint().await;
    let mut client = client(&endpoint);
    assert!(matches!(client.try_open().await, Err(ClientError::Transport(_))));
    assert!(client.list_capabilities().await.is_none());
}

// ============================================================================
// PROBE TESTS
// ============================================================================

#[tokio::test]
async fn test_probe_raw_tier_accepts_not_found() {
    let mock = Mock::new(StatusCode::NOT_FOUND, StatusCode::OK);
    let endpoint = spawn_worker(Arc::clone(&mock)).await;
    let mut client = client(&endpoint);

    assert!(client.probe().await);
    assert!(mock.seen().is_empty(), "raw tier should not issue RPCs");
}

#[tokio::test]
async fn test_probe_falls_through_to_handshake_tier() {
    let mock = Mock::new(StatusCode::INTERNAL_SERVER_ERROR, StatusCode::OK);
    let endpoint = spawn_worker(Arc::clone(&mock)).await;
    let mut client = client(&endpoint);

    assert!(client.probe().await);
    let seen = mock.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "initialize");
    assert_eq!(seen[0].id, json!(999));
    assert!(client.session_id().is_none());
}

#[tokio::test]
async fn test_probe_fails_when_every_tier_fails() {
    let mock = Mock::new(StatusCode::INTERNAL_SERVER_ERROR, StatusCode::INTERNAL_SERVER_ERROR);
    let endpoint = spawn_worker(Arc::clone(&mock)).await;
    let mut client = client(&endpoint);

    assert!(!client.probe().await);
    let methods: Vec<String> = mock.seen().into_iter().map(|s| s.method).collect();
    assert_eq!(methods, vec!["initialize", "tools/list"]);

    let mut unreachable = McpClient::new(closed_endpoint().await, ClientConfig::default());
    assert!(!unreachable.probe().await);
}

// ============================================================================
// CLOSE TESTS
// ============================================================================

#[tokio::test]
async fn test_close_is_idempotent() {
    let mock = Mock::new(StatusCode::NOT_FOUND, StatusCode::OK);
    let endpoint = spawn_worker(mock).await;
    let mut client = client(&endpoint);
    assert!(client.open().await);

    client.close();
    client.close();
    assert!(client.is_closed());
    assert!(client.invoke("structured", json!({})).await.is_none());
    assert!(!client.probe().await);
    assert!(matches!(client.try_open().await, Err(ClientError::Closed)));
}
