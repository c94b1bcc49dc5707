//! JSON-RPC 2.0 envelopes and event-stream framing.
//!
//! Workers answer `POST` requests either with a plain JSON body or with one or
//! more `data: <json>` lines in server-sent-event style. Both are reduced to a
//! single [`RpcEnvelope`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::ClientError;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier.
    Number(u64),
    /// String identifier.
    Text(String),
}

impl RequestId {
    /// Fresh UUID-based identifier.
    #[must_use]
    pub fn random() -> Self {
        Self::Text(uuid::Uuid::new_v4().to_string())
    }
}

/// Outgoing request or notification.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Request id; absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    pub params: Value,
}

impl RpcRequest {
    /// Build a request that expects a reply.
    pub fn call(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Build a fire-and-forget notification.
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: None,
            method: method.into(),
            params,
        }
    }
}

/// Decoded response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcEnvelope {
    /// Echoed request id.
    #[serde(default)]
    pub id: Option<Value>,
    /// Successful result.
    #[serde(default)]
    pub result: Option<Value>,
    /// Protocol-level error object.
    #[serde(default)]
    pub error: Option<Value>,
}

impl RpcEnvelope {
    /// Whether the envelope carries either a `result` or an `error`.
    #[must_use]
    pub const fn is_answer(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    /// Return the result, turning an `error` member into [`ClientError::Protocol`].
    ///
    /// # Errors
    ///
    /// `Protocol` if the envelope carries an error, `MalformedResponse` if it
    /// carries neither member.
    pub fn into_result(self) -> Result<Value, ClientError> {
        if let Some(err) = self.error {
            return Err(protocol_error(&err));
        }
        self.result
            .ok_or_else(|| ClientError::MalformedResponse("envelope has no result".into()))
    }
}

fn protocol_error(err: &Value) -> ClientError {
    let code = err.get("code").and_then(Value::as_i64);
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| err.to_string(), str::to_string);
    ClientError::Protocol { code, message }
}

/// Extract the first parseable JSON object from a response body.
///
/// Lines of the form `data: <json>` are tried in order; the first one that
/// parses to an object wins. A body without any `data:` line is parsed as
/// plain JSON.
///
/// # Errors
///
/// `MalformedResponse` if nothing in the body decodes to an envelope.
pub fn parse_event_stream(body: &str) -> Result<RpcEnvelope, ClientError> {
    let mut saw_data = false;
    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        saw_data = true;
        let data = data.trim_start();
        match serde_json::from_str::<Value>(data) {
            Ok(value @ Value::Object(_)) => return envelope_from(value),
            Ok(_) => tracing::debug!("skipping non-object event payload"),
            Err(e) => tracing::warn!(error = %e, "unparseable event payload"),
        }
    }

    if !saw_data {
        let trimmed = body.trim();
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
            return envelope_from(value);
        }
    }

    Err(ClientError::MalformedResponse(format!(
        "no JSON object in response ({} bytes)",
        body.len()
    )))
}

fn envelope_from(value: Value) -> Result<RpcEnvelope, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::MalformedResponse(e.to_string()))
}

/// Reduce a `tools/call` result to its payload.
///
/// Precedence: a non-empty `structuredContent`, then the `text` fragments of
/// `content` joined with newlines as `{"text": ...}`, then the raw result.
///
/// # Errors
///
/// `ToolExecution` if the result sets `isError`.
pub fn extract_tool_payload(result: Value) -> Result<Value, ClientError> {
    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return Err(ClientError::ToolExecution(result.to_string()));
    }

    if let Some(structured) = result.get("structuredContent") {
        if is_present(structured) {
            return Ok(structured.clone());
        }
    }

    if let Some(items) = result.get("content").and_then(Value::as_array) {
        let texts: Vec<&str> = items
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
            .map(|item| item.get("text").and_then(Value::as_str).unwrap_or(""))
            .collect();
        if !texts.is_empty() {
            return Ok(json!({ "text": texts.join("\n") }));
        }
    }

    Ok(result)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_stream_first_parseable_object() {
        let body = "event: message\ndata: not-json\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":true}}\n\n";
        let env = parse_event_stream(body).unwrap();
        assert_eq!(env.result, Some(json!({"ok": true})));
        assert!(env.error.is_none());
    }

    #[test]
    fn test_plain_json_body() {
        let env = parse_event_stream("{\"jsonrpc\":\"2.0\",\"id\":\"x\",\"error\":{\"code\":-32601,\"message\":\"nope\"}}").unwrap();
        assert!(env.is_answer());
        match env.into_result() {
            Err(ClientError::Protocol { code, message }) => {
                assert_eq!(code, Some(-32601));
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            parse_event_stream("data: [1,2]\n"),
            Err(ClientError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_event_stream(""),
            Err(ClientError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_payload_precedence() {
        let structured = json!({"structuredContent": {"title": "Example"}, "content": [{"type": "text", "text": "ignored"}]});
        assert_eq!(extract_tool_payload(structured).unwrap(), json!({"title": "Example"}));

        let text = json!({"structuredContent": {}, "content": [
            {"type": "text", "text": "line one"},
            {"type": "image", "data": "AAAA"},
            {"type": "text", "text": "line two"}
        ]});
        assert_eq!(extract_tool_payload(text).unwrap(), json!({"text": "line one\nline two"}));

        let raw = json!({"content": [{"type": "image", "data": "AAAA"}]});
        assert_eq!(extract_tool_payload(raw.clone()).unwrap(), raw);
    }

    #[test]
    fn test_is_error_flag() {
        let failed = json!({"isError": true, "content": [{"type": "text", "text": "boom"}]});
        assert!(matches!(
            extract_tool_payload(failed),
            Err(ClientError::ToolExecution(_))
        ));
    }

    #[test]
    fn test_notification_has_no_id() {
        let n = serde_json::to_value(RpcRequest::notification("notifications/initialized", json!({}))).unwrap();
        assert!(n.get("id").is_none());
        let c = serde_json::to_value(RpcRequest::call(RequestId::Number(1), "initialize", json!({}))).unwrap();
        assert_eq!(c["id"], json!(1));
        assert_eq!(c["jsonrpc"], json!("2.0"));
    }
}
