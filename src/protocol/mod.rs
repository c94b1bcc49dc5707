//! Worker protocol: JSON-RPC 2.0 over HTTP with event-stream framed replies.

pub mod client;
pub mod jsonrpc;

pub use client::{
    Capability, ClientFactory, McpClient, McpClientFactory, WorkerClient, ACCEPT_VALUE,
    SESSION_HEADER,
};
pub use jsonrpc::{extract_tool_payload, parse_event_stream, RequestId, RpcEnvelope, RpcRequest};
