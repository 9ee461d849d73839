//! Adapter implementations for the backend client ports.

pub mod config_file;
pub mod memory;
pub mod stdio;

pub use config_file::{ConfigLoadError, load_config};
pub use memory::{BackendScript, InMemoryBackends, RecordedCall, ScriptedBehaviour};
pub use stdio::{StdioBackendClient, StdioConnector};
