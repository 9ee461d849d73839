//! Stdio adapter: backends run as child processes speaking line-delimited
//! JSON-RPC 2.0.

mod client;
pub mod protocol;
mod transport;

pub use client::{SHUTDOWN_GRACE_PERIOD, StdioBackendClient, StdioConnector};
pub use transport::JsonRpcTransport;
