//! Protocol client used by the health monitor and dispatchers.
//!
//! [`WorkerClient`] is the seam the scheduling loops depend on. Its methods
//! never fail loudly: every transport, protocol, execution, or framing failure
//! becomes `false` / `None` and is logged. [`McpClient`] additionally exposes
//! `try_*` methods that keep the [`ClientError`] cause.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::core::ClientError;

use super::jsonrpc::{extract_tool_payload, parse_event_stream, RequestId, RpcEnvelope, RpcRequest};

/// Response header carrying the session token.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Accept header sent with every JSON-RPC post.
pub const ACCEPT_VALUE: &str = "application/json, text/event-stream";

/// Id used for probe-tier requests.
const PROBE_REQUEST_ID: u64 = 999;

/// Status codes from the raw connectivity check that count as "alive".
const ALIVE_STATUSES: [u16; 3] = [200, 404, 405];

/// A capability advertised by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Invocable name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments, when advertised.
    #[serde(default, rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Session-scoped client for a single worker endpoint.
#[async_trait]
pub trait WorkerClient: Send {
    /// Perform the versioned handshake. Returns `true` on success.
    async fn open(&mut self) -> bool;

    /// List invocable capabilities, or `None` on any failure.
    async fn list_capabilities(&mut self) -> Option<Vec<Capability>>;

    /// Invoke a capability, or `None` on any failure.
    async fn invoke(&mut self, name: &str, arguments: Value) -> Option<Value>;

    /// Layered liveness check.
    async fn probe(&mut self) -> bool;

    /// Release the connection. Safe to call repeatedly.
    fn close(&mut self);

    /// Session token captured during the last successful handshake.
    fn session_id(&self) -> Option<&str>;
}

/// Creates a fresh client per use; clients are never shared between loops.
pub trait ClientFactory: Send + Sync + 'static {
    /// Build an unopened client for `endpoint`.
    fn connect(&self, endpoint: &str) -> Box<dyn WorkerClient>;
}

/// Factory for [`McpClient`].
#[derive(Debug, Clone, Default)]
pub struct McpClientFactory {
    config: ClientConfig,
}

impl McpClientFactory {
    /// Create a factory with the given client settings.
    #[must_use]
    pub const fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for McpClientFactory {
    fn connect(&self, endpoint: &str) -> Box<dyn WorkerClient> {
        Box::new(McpClient::new(endpoint, self.config.clone()))
    }
}

/// Reply to a JSON-RPC post.
struct RpcReply {
    envelope: RpcEnvelope,
    session_id: Option<String>,
}

/// JSON-RPC over HTTP client with event-stream framed replies.
pub struct McpClient {
    endpoint: String,
    config: ClientConfig,
    http: Option<reqwest::Client>,
    session_id: Option<String>,
}

impl McpClient {
    /// Create an unopened client for `endpoint`.
    pub fn new(endpoint: impl Into<String>, config: ClientConfig) -> Self {
        let endpoint = endpoint.into();
        let http = match reqwest::Client::builder().build() {
            Ok(client) => Some(client),
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "failed to build http client");
                None
            }
        };
        Self {
            endpoint,
            config,
            http,
            session_id: None,
        }
    }

    /// Endpoint this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether `close` has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.http.is_none()
    }

    /// URL used by the raw connectivity probe: the endpoint without a trailing `/mcp`.
    #[must_use]
    pub fn probe_url(&self) -> String {
        let trimmed = self.endpoint.trim_end_matches('/');
        trimmed.strip_suffix("/mcp").unwrap_or(trimmed).to_string()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        if let Some(session) = &self.session_id {
            match HeaderValue::from_str(session) {
                Ok(value) => {
                    headers.insert(SESSION_HEADER, value);
                }
                Err(e) => warn!(endpoint = %self.endpoint, error = %e, "session id is not a valid header value"),
            }
        }
        headers
    }

    async fn post(&self, request: &RpcRequest, timeout: Duration) -> Result<reqwest::Response, ClientError> {
        let http = self.http.as_ref().ok_or(ClientError::Closed)?;
        let response = http
            .post(&self.endpoint)
            .headers(self.headers())
            .json(request)
            .timeout(timeout)
            .send()
            .await?;
        Ok(response)
    }

    async fn rpc(&self, request: &RpcRequest, timeout: Duration) -> Result<RpcReply, ClientError> {
        let response = self.post(request, timeout).await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ClientError::HttpStatus(status));
        }
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        let envelope = parse_event_stream(&body)?;
        Ok(RpcReply { envelope, session_id })
    }

    fn initialize_request(&self, id: u64, capabilities: Value, client_name: &str) -> RpcRequest {
        RpcRequest::call(
            RequestId::Number(id),
            "initialize",
            json!({
                "protocolVersion": self.config.protocol_version,
                "capabilities": capabilities,
                "clientInfo": {
                    "name": client_name,
                    "version": self.config.client_version,
                },
            }),
        )
    }

    /// Handshake, keeping the failure cause.
    ///
    /// # Errors
    ///
    /// Any [`ClientError`]; on error no session token is captured.
    pub async fn try_open(&mut self) -> Result<(), ClientError> {
        let request = self.initialize_request(
            1,
            json!({ "tools": { "listChanged": true } }),
            &self.config.client_name,
        );
        let reply = self.rpc(&request, self.config.initialize_timeout()).await?;
        reply.envelope.into_result()?;

        if let Some(session) = reply.session_id {
            debug!(endpoint = %self.endpoint, session = %session, "session established");
            self.session_id = Some(session);
        }
        self.send_initialized().await;
        Ok(())
    }

    async fn send_initialized(&self) {
        let notification = RpcRequest::notification("notifications/initialized", json!({}));
        if let Err(e) = self.post(&notification, self.config.notify_timeout()).await {
            debug!(endpoint = %self.endpoint, error = %e, "initialized notification not delivered");
        }
    }

    /// List capabilities, keeping the failure cause.
    ///
    /// # Errors
    ///
    /// Any [`ClientError`].
    pub async fn try_list_capabilities(&mut self) -> Result<Vec<Capability>, ClientError> {
        let request = RpcRequest::call(RequestId::random(), "tools/list", json!({}));
        let reply = self.rpc(&request, self.config.list_timeout()).await?;
        let result = reply.envelope.into_result()?;
        match result.get("tools") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(tools) => serde_json::from_value(tools.clone())
                .map_err(|e| ClientError::MalformedResponse(format!("tools: {e}"))),
        }
    }

    /// Invoke a capability, keeping the failure cause.
    ///
    /// # Errors
    ///
    /// `Transport`/`HttpStatus`/`MalformedResponse` for delivery problems,
    /// `Protocol` for an envelope error, `ToolExecution` for `isError`.
    pub async fn try_invoke(&mut self, name: &str, arguments: Value) -> Result<Value, ClientError> {
        let request = RpcRequest::call(
            RequestId::random(),
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        );
        let reply = self.rpc(&request, self.config.call_timeout()).await?;
        let result = reply.envelope.into_result()?;
        extract_tool_payload(result)
    }

    async fn probe_raw(&self) -> Result<bool, ClientError> {
        let http = self.http.as_ref().ok_or(ClientError::Closed)?;
        let response = http
            .get(self.probe_url())
            .timeout(self.config.raw_probe_timeout())
            .send()
            .await?;
        Ok(ALIVE_STATUSES.contains(&response.status().as_u16()))
    }

    async fn probe_rpc(&self, request: &RpcRequest) -> Result<bool, ClientError> {
        let reply = self.rpc(request, self.config.probe_rpc_timeout()).await?;
        Ok(reply.envelope.is_answer())
    }
}

#[async_trait]
impl WorkerClient for McpClient {
    async fn open(&mut self) -> bool {
        match self.try_open().await {
            Ok(()) => true,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "handshake failed");
                false
            }
        }
    }

    async fn list_capabilities(&mut self) -> Option<Vec<Capability>> {
        match self.try_list_capabilities().await {
            Ok(tools) => Some(tools),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "capability listing failed");
                None
            }
        }
    }

    async fn invoke(&mut self, name: &str, arguments: Value) -> Option<Value> {
        match self.try_invoke(name, arguments).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(endpoint = %self.endpoint, tool = name, error = %e, "invocation failed");
                None
            }
        }
    }

    async fn probe(&mut self) -> bool {
        match self.probe_raw().await {
            Ok(true) => return true,
            Ok(false) => debug!(endpoint = %self.endpoint, "raw probe got unexpected status"),
            Err(e) => debug!(endpoint = %self.endpoint, error = %e, "raw probe failed"),
        }

        let handshake = self.initialize_request(PROBE_REQUEST_ID, json!({}), "health-check");
        match self.probe_rpc(&handshake).await {
            Ok(true) => return true,
            Ok(false) => debug!(endpoint = %self.endpoint, "handshake probe got empty envelope"),
            Err(e) => debug!(endpoint = %self.endpoint, error = %e, "handshake probe failed"),
        }

        let listing = RpcRequest::call(RequestId::Number(PROBE_REQUEST_ID), "tools/list", json!({}));
        match self.probe_rpc(&listing).await {
            Ok(alive) => alive,
            Err(e) => {
                debug!(endpoint = %self.endpoint, error = %e, "listing probe failed");
                false
            }
        }
    }

    fn close(&mut self) {
        self.http = None;
    }

    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}
