//! Routing table from namespaced identifiers to backend tools.

use super::{BackendName, ToolDescriptor};
use std::collections::HashMap;

/// Outcome of registering a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The identifier was not registered before.
    New,
    /// The same backend tool was registered again.
    Refreshed,
    /// Another tool of the same backend sanitizes to this identifier, for
    /// example `get-data` and `get_data`. The new tool replaced it.
    ReplacedSibling {
        /// Original name of the replaced tool.
        previous_tool: String,
    },
    /// A tool of a different backend owned this identifier and was replaced.
    ReplacedForeign {
        /// Backend of the replaced tool.
        previous_backend: BackendName,
        /// Original name of the replaced tool.
        previous_tool: String,
    },
}

/// Mapping from namespaced identifier to the descriptor of its backend tool.
///
/// The table itself is not synchronised; the facade guards it together with
/// the session set behind one reader/writer lock.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, ToolDescriptor>,
}

impl RoutingTable {
    /// Creates an empty routing table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `descriptor` under its namespaced identifier.
    ///
    /// The last registration for an identifier wins; the returned value says
    /// what, if anything, was overwritten.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Registration {
        let key = descriptor.namespaced_name().to_owned();
        let Some(previous) = self.routes.insert(key, descriptor.clone()) else {
            return Registration::New;
        };

        if previous.backend() != descriptor.backend() {
            return Registration::ReplacedForeign {
                previous_backend: previous.backend().clone(),
                previous_tool: previous.original_name().to_owned(),
            };
        }

        if previous.original_name() == descriptor.original_name() {
            Registration::Refreshed
        } else {
            Registration::ReplacedSibling {
                previous_tool: previous.original_name().to_owned(),
            }
        }
    }

    /// Looks up the descriptor registered under `namespaced_name`.
    #[must_use]
    pub fn resolve(&self, namespaced_name: &str) -> Option<&ToolDescriptor> {
        self.routes.get(namespaced_name)
    }

    /// Iterates over every registered descriptor in map order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.routes.values()
    }

    /// Returns how many routes currently lead to `backend`.
    #[must_use]
    pub fn count_for(&self, backend: &BackendName) -> usize {
        self.routes
            .values()
            .filter(|descriptor| descriptor.backend() == backend)
            .count()
    }

    /// Removes every route.
    pub fn clear(&mut self) {
        self.routes.clear();
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns whether no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
