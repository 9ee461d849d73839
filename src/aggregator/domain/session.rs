//! Backend session lifecycle.

use super::{AggregatorDomainError, BackendName, ParseSessionStateError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of one backend session.
///
/// A fresh identifier is allocated for every session; sessions are never
/// reused, so two sessions for the same backend name never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lifecycle state of a backend session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Definition accepted, no client handle yet.
    Configured,
    /// Client handle constructed, handshake pending.
    Connecting,
    /// Handshake completed.
    Ready,
    /// Tool discovery in progress.
    Discovering,
    /// Tools discovered and registered.
    Active,
    /// Handshake or discovery failed.
    Failed,
    /// Client handle released.
    Closed,
}

impl SessionState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Discovering => "discovering",
            Self::Active => "active",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }

    /// Returns whether transition to `target` is allowed.
    ///
    /// States only move forward. `Failed` is reachable from `Connecting` and
    /// `Discovering`; `Closed` is reachable from every state except itself.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Configured, Self::Connecting)
                | (Self::Connecting, Self::Ready)
                | (Self::Ready, Self::Discovering)
                | (Self::Discovering, Self::Active)
                | (Self::Connecting | Self::Discovering, Self::Failed)
                | (
                    Self::Configured
                        | Self::Connecting
                        | Self::Ready
                        | Self::Discovering
                        | Self::Active
                        | Self::Failed,
                    Self::Closed
                )
        )
    }

    /// Returns whether the session contributes tools to the routing table.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SessionState {
    type Error = ParseSessionStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "configured" => Ok(Self::Configured),
            "connecting" => Ok(Self::Connecting),
            "ready" => Ok(Self::Ready),
            "discovering" => Ok(Self::Discovering),
            "active" => Ok(Self::Active),
            "failed" => Ok(Self::Failed),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseSessionStateError(value.to_owned())),
        }
    }
}

/// Identity a backend reports during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Reported server name.
    pub name: String,
    /// Reported server version.
    pub version: String,
}

impl ServerInfo {
    /// Creates server identity metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Lifecycle bookkeeping for one backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLifecycle {
    id: SessionId,
    backend: BackendName,
    state: SessionState,
    server_info: Option<ServerInfo>,
    tool_count: usize,
    failure: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionLifecycle {
    /// Creates a lifecycle in the `Configured` state.
    #[must_use]
    pub fn new(backend: BackendName, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: SessionId::new(),
            backend,
            state: SessionState::Configured,
            server_info: None,
            tool_count: 0,
            failure: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the backend name.
    #[must_use]
    pub const fn backend(&self) -> &BackendName {
        &self.backend
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the identity reported during the handshake.
    #[must_use]
    pub const fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Returns the number of tools registered for this session.
    #[must_use]
    pub const fn tool_count(&self) -> usize {
        self.tool_count
    }

    /// Returns the reason recorded when the session failed.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Records that a client handle exists for the backend.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorDomainError::InvalidLifecycleTransition`] when the
    /// transition is not allowed.
    pub fn mark_connecting(&mut self, clock: &impl Clock) -> Result<(), AggregatorDomainError> {
        self.transition_to(SessionState::Connecting, clock)
    }

    /// Records a completed handshake.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorDomainError::InvalidLifecycleTransition`] when the
    /// transition is not allowed.
    pub fn mark_ready(
        &mut self,
        server_info: ServerInfo,
        clock: &impl Clock,
    ) -> Result<(), AggregatorDomainError> {
        self.transition_to(SessionState::Ready, clock)?;
        self.server_info = Some(server_info);
        Ok(())
    }

    /// Records that tool discovery has started.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorDomainError::InvalidLifecycleTransition`] when the
    /// transition is not allowed.
    pub fn mark_discovering(&mut self, clock: &impl Clock) -> Result<(), AggregatorDomainError> {
        self.transition_to(SessionState::Discovering, clock)
    }

    /// Records successful discovery of `tool_count` registered tools.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorDomainError::InvalidLifecycleTransition`] when the
    /// transition is not allowed.
    pub fn mark_active(
        &mut self,
        tool_count: usize,
        clock: &impl Clock,
    ) -> Result<(), AggregatorDomainError> {
        self.transition_to(SessionState::Active, clock)?;
        self.tool_count = tool_count;
        Ok(())
    }

    /// Replaces the tool count of an active session whose routes were taken
    /// over by a later registration.
    pub fn refresh_tool_count(&mut self, tool_count: usize, clock: &impl Clock) {
        if self.state == SessionState::Active && self.tool_count != tool_count {
            self.tool_count = tool_count;
            self.updated_at = clock.utc();
        }
    }

    /// Records a handshake or discovery failure.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorDomainError::InvalidLifecycleTransition`] when the
    /// transition is not allowed.
    pub fn mark_failed(
        &mut self,
        reason: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), AggregatorDomainError> {
        self.transition_to(SessionState::Failed, clock)?;
        self.failure = Some(reason.into());
        self.tool_count = 0;
        Ok(())
    }

    /// Records that the client handle was released.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorDomainError::InvalidLifecycleTransition`] when the
    /// session is already closed.
    pub fn mark_closed(&mut self, clock: &impl Clock) -> Result<(), AggregatorDomainError> {
        self.transition_to(SessionState::Closed, clock)
    }

    /// Captures a read-only view of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            backend: self.backend.clone(),
            state: self.state,
            server_info: self.server_info.clone(),
            tool_count: self.tool_count,
            failure: self.failure.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn transition_to(
        &mut self,
        target_state: SessionState,
        clock: &impl Clock,
    ) -> Result<(), AggregatorDomainError> {
        if !self.state.can_transition_to(target_state) {
            return Err(AggregatorDomainError::InvalidLifecycleTransition {
                from: self.state.as_str().to_owned(),
                to: target_state.as_str().to_owned(),
            });
        }

        self.state = target_state;
        self.updated_at = clock.utc();
        Ok(())
    }
}

/// Point-in-time view of a backend session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: SessionId,
    /// Backend name.
    pub backend: BackendName,
    /// Lifecycle state.
    pub state: SessionState,
    /// Identity reported during the handshake.
    pub server_info: Option<ServerInfo>,
    /// Number of registered tools.
    pub tool_count: usize,
    /// Failure reason, when the session failed.
    pub failure: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest transition timestamp.
    pub updated_at: DateTime<Utc>,
}
