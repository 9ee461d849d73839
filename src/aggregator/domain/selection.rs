//! Allow-list evaluation for discovered tools.

use super::{BackendConfig, sanitize};
use std::collections::HashSet;

/// Which discovered tools of a backend are eligible for registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelection {
    /// No allow-list is configured; every tool is eligible.
    All,
    /// Only tools whose sanitized name is in the set are eligible. An empty
    /// set admits nothing.
    Only(HashSet<String>),
}

impl ToolSelection {
    /// Derives the selection from a backend definition.
    ///
    /// Allow-list entries are sanitized so that separator differences between
    /// configuration and backend-reported names do not matter.
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Self {
        config.tools().map_or(Self::All, |filter| {
            Self::Only(filter.allowed().iter().map(|name| sanitize(name)).collect())
        })
    }

    /// Returns whether `tool_name` may be registered.
    #[must_use]
    pub fn admits(&self, tool_name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(allowed) => allowed.contains(&sanitize(tool_name)),
        }
    }

    /// Returns whether no tool can ever be admitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(allowed) if allowed.is_empty())
    }
}
