//! Tool discovery for one backend session.

use crate::aggregator::{
    domain::{BackendConfig, ToolDescriptor, ToolSelection, sanitize},
    ports::{BackendClient, BackendClientResult},
};
use tracing::debug;

/// Tools discovered on one backend, filtered and namespaced.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredCatalog {
    /// Number of tools the backend reported before filtering.
    pub reported: usize,
    /// Eligible tools, in the order the backend reported them.
    pub descriptors: Vec<ToolDescriptor>,
}

/// Queries `client` for its tools and keeps those the allow-list of `config`
/// admits.
///
/// An allow-list that is present but empty yields an empty catalog; that is
/// not an error.
///
/// # Errors
///
/// Returns the client error when the tool listing fails. Nothing is
/// discovered in that case.
pub async fn discover(
    client: &dyn BackendClient,
    config: &BackendConfig,
) -> BackendClientResult<DiscoveredCatalog> {
    let backend = config.name();
    debug!(backend = %backend, "discovering tools");
    let tools = client.list_tools().await?;
    let reported = tools.len();
    debug!(backend = %backend, count = reported, "backend reported tools");

    let selection = ToolSelection::from_config(config);
    match &selection {
        ToolSelection::All => debug!(backend = %backend, "no tool filtering configured"),
        ToolSelection::Only(allowed) if allowed.is_empty() => {
            debug!(backend = %backend, "empty allow-list, no tools will be exposed");
            return Ok(DiscoveredCatalog {
                reported,
                descriptors: Vec::new(),
            });
        }
        ToolSelection::Only(allowed) => {
            debug!(backend = %backend, allowed = ?allowed, "tool filtering enabled");
        }
    }

    let descriptors = tools
        .into_iter()
        .filter(|tool| {
            let admitted = selection.admits(&tool.name);
            if !admitted {
                debug!(
                    backend = %backend,
                    tool = %tool.name,
                    normalized = %sanitize(&tool.name),
                    "skipping tool not in allow-list"
                );
            }
            admitted
        })
        .map(|tool| ToolDescriptor::new(backend.clone(), tool))
        .collect();

    Ok(DiscoveredCatalog {
        reported,
        descriptors,
    })
}
