//! Client port for one backend server.

use crate::aggregator::domain::{
    BackendConfig, RemoteTool, ServerInfo, ToolCallRequest, ToolCallResult,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for backend client operations.
pub type BackendClientResult<T> = Result<T, BackendClientError>;

/// Identity the aggregator presents to each backend during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl ClientInfo {
    /// Creates client identity metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }
}

/// Protocol operations the aggregator needs from one backend.
///
/// A client is constructed but not initialised; [`BackendClient::handshake`]
/// must succeed before any other operation is meaningful.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Performs the initial capability and version negotiation.
    async fn handshake(&self, client_info: &ClientInfo) -> BackendClientResult<ServerInfo>;

    /// Lists every tool the backend exposes.
    async fn list_tools(&self) -> BackendClientResult<Vec<RemoteTool>>;

    /// Invokes one tool by its backend-local name.
    async fn call_tool(&self, request: ToolCallRequest) -> BackendClientResult<ToolCallResult>;

    /// Releases the connection and any process behind it.
    async fn close(&self) -> BackendClientResult<()>;
}

/// Builds client handles from backend definitions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// Constructs a client for `config` without performing the handshake.
    async fn connect(&self, config: &BackendConfig) -> BackendClientResult<Arc<dyn BackendClient>>;
}

/// Errors returned by backend client adapters.
#[derive(Debug, Clone, Error)]
pub enum BackendClientError {
    /// The backend answered with a JSON-RPC error object.
    #[error("backend error [{code}]: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
        /// Optional structured error data.
        data: Option<Value>,
    },

    /// The request could not be written or the response could not be read.
    #[error("transport error: {reason}")]
    Transport {
        /// Failure description.
        reason: String,
    },

    /// The connection is closed.
    #[error("backend connection is closed")]
    Closed,

    /// Generic adapter failure.
    #[error("backend client error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl BackendClientError {
    /// Wraps an adapter failure.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }

    /// Creates a transport error from a description.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}
