//! Backend configuration value objects.

use super::{AggregatorDomainError, BackendName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Optional per-backend restriction of the exposed tools.
///
/// An empty `allowed` list is meaningful: it exposes no tools at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFilter {
    #[serde(default)]
    allowed: Vec<String>,
}

impl ToolFilter {
    /// Creates a filter from the allowed tool names.
    #[must_use]
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Returns the allowed tool names as configured.
    #[must_use]
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

/// Launch and exposure settings for one backend server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BackendConfigRecord")]
pub struct BackendConfig {
    name: BackendName,
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    tools: Option<ToolFilter>,
}

#[derive(Deserialize)]
struct BackendConfigRecord {
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    tools: Option<ToolFilter>,
}

impl TryFrom<BackendConfigRecord> for BackendConfig {
    type Error = AggregatorDomainError;

    fn try_from(record: BackendConfigRecord) -> Result<Self, Self::Error> {
        let mut config = Self::new(record.name, record.command)?
            .with_args(record.args)
            .with_env(record.env);
        config.tools = record.tools;
        Ok(config)
    }
}

impl BackendConfig {
    /// Creates a backend definition with no arguments, no environment
    /// overrides, and no tool filtering.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorDomainError`] when the name or the command is empty
    /// after trimming.
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<Self, AggregatorDomainError> {
        let backend_name = BackendName::new(name)?;
        let normalized_command = command.into().trim().to_owned();
        if normalized_command.is_empty() {
            return Err(AggregatorDomainError::EmptyCommand {
                backend: backend_name.to_string(),
            });
        }

        Ok(Self {
            name: backend_name,
            command: normalized_command,
            args: Vec::new(),
            env: BTreeMap::new(),
            tools: None,
        })
    }

    /// Replaces the command-line arguments.
    #[must_use]
    pub fn with_args(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.args = values.into_iter().collect();
        self
    }

    /// Replaces the environment variable overrides.
    #[must_use]
    pub fn with_env(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = values.into_iter().collect();
        self
    }

    /// Restricts the exposed tools to `allowed`.
    #[must_use]
    pub fn with_allowed_tools(mut self, allowed: impl IntoIterator<Item = String>) -> Self {
        self.tools = Some(ToolFilter::new(allowed));
        self
    }

    /// Returns the backend name.
    #[must_use]
    pub const fn name(&self) -> &BackendName {
        &self.name
    }

    /// Returns the executable command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns command-line arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns environment variable overrides.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the tool filter, if one is configured.
    #[must_use]
    pub const fn tools(&self) -> Option<&ToolFilter> {
        self.tools.as_ref()
    }
}

/// Ordered set of backend definitions with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AggregatorConfigRecord")]
pub struct AggregatorConfig {
    servers: Vec<BackendConfig>,
}

#[derive(Deserialize)]
struct AggregatorConfigRecord {
    #[serde(default)]
    servers: Vec<BackendConfig>,
}

impl TryFrom<AggregatorConfigRecord> for AggregatorConfig {
    type Error = AggregatorDomainError;

    fn try_from(record: AggregatorConfigRecord) -> Result<Self, Self::Error> {
        Self::new(record.servers)
    }
}

impl AggregatorConfig {
    /// Creates a configuration, preserving declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorDomainError::DuplicateBackendName`] when two
    /// definitions share a name.
    pub fn new(servers: Vec<BackendConfig>) -> Result<Self, AggregatorDomainError> {
        let mut seen = HashSet::with_capacity(servers.len());
        for server in &servers {
            if !seen.insert(server.name()) {
                return Err(AggregatorDomainError::DuplicateBackendName(
                    server.name().to_string(),
                ));
            }
        }
        Ok(Self { servers })
    }

    /// Returns the backend definitions in declaration order.
    #[must_use]
    pub fn servers(&self) -> &[BackendConfig] {
        &self.servers
    }
}
