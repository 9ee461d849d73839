//! Error types for aggregation domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing aggregation domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregatorDomainError {
    /// The backend name is empty after trimming.
    #[error("backend name must not be empty")]
    EmptyBackendName,

    /// The launch command of a backend is empty after trimming.
    #[error("launch command for backend '{backend}' must not be empty")]
    EmptyCommand {
        /// Backend whose command is missing.
        backend: String,
    },

    /// Two backend definitions share a name.
    #[error("duplicate backend name: {0}")]
    DuplicateBackendName(String),

    /// Transitioning between two session states is invalid.
    #[error("invalid backend session transition: {from} -> {to}")]
    InvalidLifecycleTransition {
        /// Current session state.
        from: String,
        /// Requested target session state.
        to: String,
    },
}

/// Error returned while parsing a session state from its canonical string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown backend session state: {0}")]
pub struct ParseSessionStateError(pub String);
