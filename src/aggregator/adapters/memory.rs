//! In-memory backend adapter for aggregation tests.

use crate::aggregator::{
    domain::{
        BackendConfig, BackendName, RemoteTool, ServerInfo, ToolCallRequest, ToolCallResult,
    },
    ports::{
        BackendClient, BackendClientError, BackendClientResult, BackendConnector, ClientInfo,
    },
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// How a scripted backend misbehaves, if at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScriptedBehaviour {
    /// Every operation succeeds.
    #[default]
    Healthy,
    /// Client construction fails with the given reason.
    RejectConnect(String),
    /// The handshake fails with the given reason.
    RejectHandshake(String),
    /// The handshake never completes.
    StallHandshake,
    /// Tool listing fails with the given reason.
    RejectDiscovery(String),
}

/// Scripted behaviour of one in-memory backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendScript {
    server_info: ServerInfo,
    tools: Vec<RemoteTool>,
    behaviour: ScriptedBehaviour,
    results: HashMap<String, ToolCallResult>,
}

impl BackendScript {
    /// Creates a healthy backend that reports `server_info` and no tools.
    #[must_use]
    pub fn new(server_info: ServerInfo) -> Self {
        Self {
            server_info,
            tools: Vec::new(),
            behaviour: ScriptedBehaviour::Healthy,
            results: HashMap::new(),
        }
    }

    /// Replaces the reported tool list.
    #[must_use]
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = RemoteTool>) -> Self {
        self.tools = tools.into_iter().collect();
        self
    }

    /// Sets how the backend misbehaves.
    #[must_use]
    pub fn with_behaviour(mut self, behaviour: ScriptedBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Sets the result returned when `tool_name` is called.
    ///
    /// Tools without a scripted result answer with a text block naming the
    /// backend and the tool.
    #[must_use]
    pub fn with_result(mut self, tool_name: impl Into<String>, result: ToolCallResult) -> Self {
        self.results.insert(tool_name.into(), result);
        self
    }
}

/// A call observed by an in-memory backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Backend that received the call.
    pub backend: BackendName,
    /// Request as the backend received it.
    pub request: ToolCallRequest,
}

/// In-memory connector whose backends follow scripts instead of running
/// processes.
///
/// Scripts are looked up by backend name when a client is constructed and
/// again on every operation, so a test may change a script between steps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackends {
    state: Arc<RwLock<InMemoryBackendsState>>,
}

#[derive(Debug, Default)]
struct InMemoryBackendsState {
    scripts: HashMap<BackendName, BackendScript>,
    calls: Vec<RecordedCall>,
    close_counts: HashMap<BackendName, usize>,
}

impl InMemoryBackends {
    /// Creates a connector with no scripted backends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a script with a backend name, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a runtime error when lock acquisition fails.
    pub fn set_backend(
        &self,
        backend: BackendName,
        script: BackendScript,
    ) -> BackendClientResult<()> {
        self.write()?.scripts.insert(backend, script);
        Ok(())
    }

    /// Returns every forwarded call in arrival order.
    ///
    /// # Errors
    ///
    /// Returns a runtime error when lock acquisition fails.
    pub fn recorded_calls(&self) -> BackendClientResult<Vec<RecordedCall>> {
        Ok(self.read()?.calls.clone())
    }

    /// Returns how many times clients of `backend` were closed.
    ///
    /// # Errors
    ///
    /// Returns a runtime error when lock acquisition fails.
    pub fn close_count(&self, backend: &BackendName) -> BackendClientResult<usize> {
        Ok(self
            .read()?
            .close_counts
            .get(backend)
            .copied()
            .unwrap_or_default())
    }

    fn script(&self, backend: &BackendName) -> BackendClientResult<BackendScript> {
        self.read()?.scripts.get(backend).cloned().ok_or_else(|| {
            BackendClientError::transport(format!("no backend scripted for {backend}"))
        })
    }

    fn read(&self) -> BackendClientResult<RwLockReadGuard<'_, InMemoryBackendsState>> {
        self.state
            .read()
            .map_err(|err| BackendClientError::runtime(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> BackendClientResult<RwLockWriteGuard<'_, InMemoryBackendsState>> {
        self.state
            .write()
            .map_err(|err| BackendClientError::runtime(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl BackendConnector for InMemoryBackends {
    async fn connect(&self, config: &BackendConfig) -> BackendClientResult<Arc<dyn BackendClient>> {
        let script = self.script(config.name())?;
        if let ScriptedBehaviour::RejectConnect(reason) = script.behaviour {
            return Err(BackendClientError::transport(reason));
        }

        Ok(Arc::new(InMemoryBackendClient {
            backend: config.name().clone(),
            backends: self.clone(),
        }))
    }
}

/// Client handle of one scripted backend.
#[derive(Debug, Clone)]
struct InMemoryBackendClient {
    backend: BackendName,
    backends: InMemoryBackends,
}

#[async_trait]
impl BackendClient for InMemoryBackendClient {
    async fn handshake(&self, _client_info: &ClientInfo) -> BackendClientResult<ServerInfo> {
        let script = self.backends.script(&self.backend)?;
        match script.behaviour {
            ScriptedBehaviour::RejectHandshake(reason) => Err(BackendClientError::Rpc {
                code: -32603,
                message: reason,
                data: None,
            }),
            ScriptedBehaviour::StallHandshake => std::future::pending().await,
            _ => Ok(script.server_info),
        }
    }

    async fn list_tools(&self) -> BackendClientResult<Vec<RemoteTool>> {
        let script = self.backends.script(&self.backend)?;
        match script.behaviour {
            ScriptedBehaviour::RejectDiscovery(reason) => Err(BackendClientError::transport(reason)),
            _ => Ok(script.tools),
        }
    }

    async fn call_tool(&self, request: ToolCallRequest) -> BackendClientResult<ToolCallResult> {
        let script = self.backends.script(&self.backend)?;
        let result = script.results.get(&request.name).cloned().unwrap_or_else(|| {
            ToolCallResult::with_content(vec![json!({
                "type": "text",
                "text": format!("{}:{}", self.backend, request.name),
            })])
        });

        self.backends.write()?.calls.push(RecordedCall {
            backend: self.backend.clone(),
            request,
        });
        Ok(result)
    }

    async fn close(&self) -> BackendClientResult<()> {
        *self
            .backends
            .write()?
            .close_counts
            .entry(self.backend.clone())
            .or_default() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn name(value: &str) -> BackendName {
        BackendName::new(value).expect("valid backend name")
    }

    fn config(value: &str) -> BackendConfig {
        BackendConfig::new(value, "in-memory").expect("valid definition")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unscripted_backend_cannot_connect() {
        let backends = InMemoryBackends::new();

        let result = backends.connect(&config("ghost")).await;

        assert!(matches!(result, Err(BackendClientError::Transport { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scripted_result_is_returned_and_call_recorded() {
        let backends = InMemoryBackends::new();
        let expected = ToolCallResult::with_content(vec![json!({"type": "text", "text": "hit"})]);
        backends
            .set_backend(
                name("search"),
                BackendScript::new(ServerInfo::new("search-server", "1.0.0"))
                    .with_result("query", expected.clone()),
            )
            .expect("script should be stored");
        let client = backends
            .connect(&config("search"))
            .await
            .expect("connect should succeed");

        let result = client
            .call_tool(ToolCallRequest::new("query", Map::new()))
            .await
            .expect("call should succeed");

        assert_eq!(result, expected);
        let calls = backends.recorded_calls().expect("calls should be readable");
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls.first().map(|call| call.request.name.as_str()),
            Some("query")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_is_counted_per_backend() {
        let backends = InMemoryBackends::new();
        backends
            .set_backend(
                name("search"),
                BackendScript::new(ServerInfo::new("search-server", "1.0.0")),
            )
            .expect("script should be stored");
        let client = backends
            .connect(&config("search"))
            .await
            .expect("connect should succeed");

        client.close().await.expect("close should succeed");

        assert_eq!(backends.close_count(&name("search")).ok(), Some(1));
        assert_eq!(backends.close_count(&name("other")).ok(), Some(0));
    }
}
