//! Shared fixtures for in-memory aggregator tests.

use std::sync::Arc;
use std::time::Duration;

use mcp_mashup::aggregator::{
    adapters::{BackendScript, InMemoryBackends, ScriptedBehaviour},
    domain::{BackendConfig, BackendName, RemoteTool, ServerInfo},
    services::Aggregator,
};
use mockable::DefaultClock;
use rstest::fixture;
use serde_json::json;

/// Aggregator type used by the in-memory tests.
pub type TestAggregator = Aggregator<InMemoryBackends, DefaultClock>;

/// Handshake deadline short enough to keep stalled-backend tests fast.
pub const TEST_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(100);

/// Scripted backends plus an aggregator connected to them.
pub struct TestContext {
    pub backends: InMemoryBackends,
    pub aggregator: Arc<TestAggregator>,
}

impl TestContext {
    /// Scripts a healthy backend exposing `tool_names`.
    pub fn healthy(&self, name: &str, tool_names: &[&str]) {
        self.scripted(name, tool_names, ScriptedBehaviour::Healthy);
    }

    /// Scripts a backend exposing `tool_names` with the given behaviour.
    pub fn scripted(&self, name: &str, tool_names: &[&str], behaviour: ScriptedBehaviour) {
        let script = BackendScript::new(ServerInfo::new(format!("{name}-server"), "1.0.0"))
            .with_tools(tools(tool_names))
            .with_behaviour(behaviour);
        self.backends
            .set_backend(backend(name), script)
            .expect("script should be stored");
    }
}

#[fixture]
pub fn context() -> TestContext {
    let backends = InMemoryBackends::new();
    let aggregator = Aggregator::new(Arc::new(backends.clone()), Arc::new(DefaultClock))
        .with_handshake_timeout(TEST_HANDSHAKE_TIMEOUT);
    TestContext {
        backends,
        aggregator: Arc::new(aggregator),
    }
}

pub fn backend(name: &str) -> BackendName {
    BackendName::new(name).expect("valid backend name")
}

pub fn config(name: &str) -> BackendConfig {
    BackendConfig::new(name, format!("{name}-server")).expect("valid definition")
}

pub fn tools(names: &[&str]) -> Vec<RemoteTool> {
    names
        .iter()
        .map(|name| {
            RemoteTool::new(
                *name,
                format!("{name} tool"),
                json!({"type": "object", "properties": {"path": {"type": "string"}}}),
            )
        })
        .collect()
}

pub fn listed_names(aggregator: &TestAggregator) -> Vec<String> {
    let mut names: Vec<String> = aggregator
        .list_tools()
        .into_iter()
        .map(|tool| tool.name)
        .collect();
    names.sort();
    names
}
