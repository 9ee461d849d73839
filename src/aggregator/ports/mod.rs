//! Port contracts for reaching backend servers.

mod client;

pub use client::{
    BackendClient, BackendClientError, BackendClientResult, BackendConnector, ClientInfo,
};

#[cfg(test)]
pub(crate) use client::{MockBackendClient, MockBackendConnector};
