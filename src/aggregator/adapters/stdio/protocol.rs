//! JSON-RPC 2.0 message shapes and MCP method payloads.

use crate::aggregator::{
    domain::{RemoteTool, ServerInfo},
    ports::{BackendClientError, BackendClientResult, ClientInfo},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Protocol revision offered during the handshake.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// JSON-RPC version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method names used by the aggregator.
pub mod methods {
    /// Handshake request.
    pub const INITIALIZE: &str = "initialize";
    /// Notification sent once the handshake response is accepted.
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Tool listing request.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation request.
    pub const TOOLS_CALL: &str = "tools/call";
}

/// Outgoing JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest<'a> {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Request identifier echoed by the response.
    pub id: u64,
    /// Method name.
    pub method: &'a str,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    /// Creates a request.
    #[must_use]
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Outgoing JSON-RPC notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcNotification<'a> {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: &'a str,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    /// Creates a notification.
    #[must_use]
    pub const fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional structured data.
    #[serde(default)]
    pub data: Option<Value>,
}

/// Incoming JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcResponse {
    /// Identifier of the request being answered.
    pub id: u64,
    /// Success payload.
    #[serde(default)]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Converts the response into its result payload.
    ///
    /// # Errors
    ///
    /// Returns [`BackendClientError::Rpc`] carrying the error object, or an
    /// internal-error code when the response has neither field.
    pub fn into_result(self) -> BackendClientResult<Value> {
        if let Some(error) = self.error {
            return Err(BackendClientError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        self.result.ok_or_else(|| BackendClientError::Rpc {
            code: -32603,
            message: "response missing both result and error".to_owned(),
            data: None,
        })
    }
}

/// Builds the `initialize` parameters.
#[must_use]
pub fn initialize_params(client_info: &ClientInfo) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": client_info.name,
            "version": client_info.version,
        },
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireServerInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
}

/// `initialize` result fields the aggregator reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    protocol_version: Option<String>,
    #[serde(default)]
    server_info: WireServerInfo,
}

impl InitializeResult {
    /// Protocol revision the server agreed to, if it reported one.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Converts the reported identity into domain metadata.
    #[must_use]
    pub fn into_server_info(self) -> ServerInfo {
        ServerInfo::new(self.server_info.name, self.server_info.version)
    }
}

/// One page of a `tools/list` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsPage {
    /// Tools on this page.
    #[serde(default)]
    pub tools: Vec<RemoteTool>,
    /// Cursor for the next page; absent or empty on the last page.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Builds the `tools/list` parameters for an optional cursor.
#[must_use]
pub fn list_tools_params(cursor: Option<&str>) -> Option<Value> {
    cursor.map(|value| json!({ "cursor": value }))
}
