//! Aggregation of several MCP backend servers into one tool surface.
//!
//! Each configured backend is connected, handshaken, and asked for its
//! tools. Discovered tools are namespaced as `<backend>_<tool>` and recorded
//! in a routing table so that calls against the merged surface can be
//! forwarded to the originating backend under the tool's original name. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
