//! mcp-mashup: one tool surface over several MCP servers.
//!
//! The crate connects to a configured set of backend tool servers, discovers
//! the tools each exposes, and presents them upstream as a single merged
//! list. Every tool is published under a namespaced identifier
//! (`<backend>_<tool>`, with `-` sanitised to `_`) and calls are routed back
//! to the owning backend under the tool's original name.
//!
//! # Architecture
//!
//! The aggregator follows hexagonal architecture principles:
//!
//! - **Domain**: naming, configuration, session lifecycle, and the routing
//!   table, with no I/O
//! - **Ports**: the backend client traits the services depend on
//! - **Adapters**: stdio JSON-RPC clients, in-memory scripted backends, and
//!   configuration file loading
//! - **Services**: tool discovery and the [`aggregator::services::Aggregator`]
//!   facade
//!
//! # Modules
//!
//! - [`aggregator`]: backend aggregation and routing
//! - [`logging`]: process-wide structured logging

pub mod aggregator;
pub mod logging;
