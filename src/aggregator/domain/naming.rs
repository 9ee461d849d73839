//! Backend names and namespace-safe identifiers.

use super::AggregatorDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Character joining the backend and tool segments of a namespaced
/// identifier.
pub const NAMESPACE_SEPARATOR: char = '_';

/// Structural separator rewritten to [`NAMESPACE_SEPARATOR`] by [`sanitize`].
const STRUCTURAL_SEPARATOR: char = '-';

/// Maps a backend or tool identifier to its namespace-safe form.
///
/// Every `-` becomes `_`; all other characters pass through unchanged. The
/// same mapping normalises allow-list entries, so `read-file` and
/// `read_file` compare equal.
///
/// # Examples
///
/// ```
/// use mcp_mashup::aggregator::domain::sanitize;
///
/// assert_eq!(sanitize("git-hub"), "git_hub");
/// assert_eq!(sanitize(&sanitize("a-b_c")), sanitize("a-b_c"));
/// ```
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.replace(STRUCTURAL_SEPARATOR, &NAMESPACE_SEPARATOR.to_string())
}

/// Builds the public identifier under which a backend tool is exposed.
#[must_use]
pub fn namespaced_identifier(backend: &BackendName, tool_name: &str) -> String {
    format!(
        "{}{NAMESPACE_SEPARATOR}{}",
        sanitize(backend.as_str()),
        sanitize(tool_name)
    )
}

/// Validated, non-empty backend name.
///
/// The name is trimmed but otherwise kept verbatim; it is the key of the
/// session set and the tag shown in tool descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackendName(String);

impl BackendName {
    /// Creates a validated backend name.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorDomainError::EmptyBackendName`] when the value is
    /// empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, AggregatorDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(AggregatorDomainError::EmptyBackendName);
        }
        Ok(Self(normalized))
    }

    /// Returns the backend name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BackendName {
    type Error = AggregatorDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BackendName> for String {
    fn from(value: BackendName) -> Self {
        value.0
    }
}

impl AsRef<str> for BackendName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
