//! Backend clients that run each server as a child process.

use super::protocol::{
    InitializeResult, ToolsPage, initialize_params, list_tools_params, methods,
};
use super::transport::JsonRpcTransport;
use crate::aggregator::{
    domain::{
        BackendConfig, BackendName, RemoteTool, ServerInfo, ToolCallRequest, ToolCallResult,
    },
    ports::{
        BackendClient, BackendClientError, BackendClientResult, BackendConnector, ClientInfo,
    },
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How long [`StdioBackendClient::close`] waits for the process to exit
/// after closing its input before killing it.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Spawns backend commands and connects to their standard streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioConnector;

impl StdioConnector {
    /// Creates a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendConnector for StdioConnector {
    async fn connect(&self, config: &BackendConfig) -> BackendClientResult<Arc<dyn BackendClient>> {
        let client = StdioBackendClient::spawn(config)?;
        Ok(Arc::new(client))
    }
}

/// Client for one backend process.
///
/// The process's stderr is inherited so backend diagnostics reach the
/// aggregator's own stderr; the process is killed if the client is dropped
/// without being closed.
pub struct StdioBackendClient {
    backend: BackendName,
    transport: JsonRpcTransport,
    child: Mutex<Option<Child>>,
}

impl StdioBackendClient {
    /// Spawns the backend command described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendClientError::Runtime`] when the process cannot be
    /// started, or [`BackendClientError::Transport`] when its standard
    /// streams cannot be captured.
    pub fn spawn(config: &BackendConfig) -> BackendClientResult<Self> {
        let mut child = Command::new(config.command())
            .args(config.args())
            .envs(config.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(BackendClientError::runtime)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendClientError::transport("backend stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendClientError::transport("backend stdout was not captured"))?;

        debug!(
            backend = %config.name(),
            command = %config.command(),
            pid = child.id(),
            "spawned backend process"
        );
        Ok(Self {
            backend: config.name().clone(),
            transport: JsonRpcTransport::new(config.name().as_str(), stdout, stdin),
            child: Mutex::new(Some(child)),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> BackendClientResult<T> {
        let result = self.transport.request(method, params).await?;
        serde_json::from_value(result).map_err(BackendClientError::runtime)
    }
}

#[async_trait]
impl BackendClient for StdioBackendClient {
    async fn handshake(&self, client_info: &ClientInfo) -> BackendClientResult<ServerInfo> {
        let result: InitializeResult = self
            .request(methods::INITIALIZE, Some(initialize_params(client_info)))
            .await?;
        debug!(
            backend = %self.backend,
            protocol_version = result.protocol_version().unwrap_or("unknown"),
            "initialize response received"
        );
        self.transport.notify(methods::INITIALIZED, None).await?;
        Ok(result.into_server_info())
    }

    async fn list_tools(&self) -> BackendClientResult<Vec<RemoteTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page: ToolsPage = self
                .request(methods::TOOLS_LIST, list_tools_params(cursor.as_deref()))
                .await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }
        Ok(tools)
    }

    async fn call_tool(&self, request: ToolCallRequest) -> BackendClientResult<ToolCallResult> {
        let params = serde_json::to_value(&request).map_err(BackendClientError::runtime)?;
        self.request(methods::TOOLS_CALL, Some(params)).await
    }

    async fn close(&self) -> BackendClientResult<()> {
        self.transport.close_writer().await;
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(backend = %self.backend, %status, "backend process exited");
                Ok(())
            }
            Ok(Err(wait_error)) => Err(BackendClientError::runtime(wait_error)),
            Err(_) => {
                warn!(
                    backend = %self.backend,
                    grace = ?SHUTDOWN_GRACE_PERIOD,
                    "backend did not exit after closing its input, killing it"
                );
                child.kill().await.map_err(BackendClientError::runtime)?;
                info!(backend = %self.backend, "backend process killed");
                Ok(())
            }
        }
    }
}
