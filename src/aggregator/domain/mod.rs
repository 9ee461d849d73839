//! Domain model for backend aggregation.
//!
//! The aggregation domain models backend configuration, the backend session
//! lifecycle, namespaced tool descriptors, allow-list selection, and the
//! routing table. Process and protocol concerns remain outside this
//! boundary.

mod config;
mod error;
mod naming;
mod routing;
mod selection;
mod session;
mod tool;

pub use config::{AggregatorConfig, BackendConfig, ToolFilter};
pub use error::{AggregatorDomainError, ParseSessionStateError};
pub use naming::{BackendName, NAMESPACE_SEPARATOR, namespaced_identifier, sanitize};
pub use routing::{Registration, RoutingTable};
pub use selection::ToolSelection;
pub use session::{ServerInfo, SessionId, SessionLifecycle, SessionSnapshot, SessionState};
pub use tool::{RemoteTool, ToolCallRequest, ToolCallResult, ToolDescriptor, normalize_input_schema};
