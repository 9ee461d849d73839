//! Application services for backend aggregation.

mod catalog;
mod facade;

pub use catalog::{DiscoveredCatalog, discover};
pub use facade::{
    Aggregator, AggregatorError, AggregatorResult, BackendInitError, DEFAULT_HANDSHAKE_TIMEOUT,
    InitializeReport,
};
