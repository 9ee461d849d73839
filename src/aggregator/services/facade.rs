//! Aggregator facade over every configured backend.
//!
//! Provides [`Aggregator`], which initialises backends one at a time,
//! tolerates per-backend failures, exposes the merged tool list, and routes
//! calls to the backend that owns each namespaced tool.

use crate::aggregator::{
    domain::{
        AggregatorDomainError, BackendConfig, BackendName, Registration, RemoteTool,
        RoutingTable, ServerInfo, SessionLifecycle, SessionSnapshot, ToolCallRequest,
        ToolCallResult, ToolDescriptor,
    },
    ports::{BackendClient, BackendClientError, BackendConnector, ClientInfo},
    services::{DiscoveredCatalog, discover},
};
use mockable::Clock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Deadline applied to each backend handshake unless overridden.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Reason one backend was skipped during initialisation.
#[derive(Debug, Error)]
pub enum BackendInitError {
    /// No client handle could be built for the backend.
    #[error("failed to create client for server {backend}: {source}")]
    Construction {
        /// Skipped backend.
        backend: BackendName,
        /// Connector failure.
        source: BackendClientError,
    },

    /// The backend rejected or failed the handshake.
    #[error("failed to initialize server {backend}: {source}")]
    Handshake {
        /// Skipped backend.
        backend: BackendName,
        /// Handshake failure.
        source: BackendClientError,
    },

    /// The handshake did not finish before the deadline.
    #[error("initialize request to server {backend} timed out after {timeout:?}")]
    HandshakeTimeout {
        /// Skipped backend.
        backend: BackendName,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// Listing the backend's tools failed; the session stays open with no
    /// tools until shutdown.
    #[error("failed to discover tools for server {backend}: {source}")]
    Discovery {
        /// Backend contributing no tools.
        backend: BackendName,
        /// Listing failure.
        source: BackendClientError,
    },

    /// A live session already exists under this backend name.
    #[error("server {backend} already has a live session")]
    DuplicateSession {
        /// Skipped backend.
        backend: BackendName,
    },

    /// The session was shut down while it was being initialised.
    #[error("session for server {backend} was closed during initialization")]
    Interrupted {
        /// Skipped backend.
        backend: BackendName,
    },

    /// The session lifecycle rejected a transition.
    #[error("lifecycle error for server {backend}: {source}")]
    Lifecycle {
        /// Affected backend.
        backend: BackendName,
        /// Rejected transition.
        source: AggregatorDomainError,
    },
}

impl BackendInitError {
    /// Returns the backend the failure belongs to.
    #[must_use]
    pub const fn backend(&self) -> &BackendName {
        match self {
            Self::Construction { backend, .. }
            | Self::Handshake { backend, .. }
            | Self::HandshakeTimeout { backend, .. }
            | Self::Discovery { backend, .. }
            | Self::DuplicateSession { backend }
            | Self::Interrupted { backend }
            | Self::Lifecycle { backend, .. } => backend,
        }
    }
}

/// Facade-level errors.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Every configured backend failed to initialise.
    #[error("no servers were successfully initialized")]
    NoBackendsAvailable {
        /// Per-backend failures, in configuration order.
        failures: Vec<BackendInitError>,
    },

    /// No tool is registered under the requested name.
    #[error("tool {name} not found")]
    ToolNotFound {
        /// Requested namespaced identifier.
        name: String,
    },

    /// The route points at a session that no longer exists.
    #[error("client for server {backend} not found")]
    BackendUnavailable {
        /// Backend named by the route.
        backend: BackendName,
    },

    /// The backend call itself failed; the error is passed through as is.
    #[error(transparent)]
    BackendCall(#[from] BackendClientError),
}

/// Result type for facade operations.
pub type AggregatorResult<T> = Result<T, AggregatorError>;

/// Outcome of a successful [`Aggregator::initialize`].
#[derive(Debug, Default)]
pub struct InitializeReport {
    /// Backends that reached the `active` state, in configuration order.
    pub active: Vec<BackendName>,
    /// Backends that were skipped, in configuration order.
    pub failures: Vec<BackendInitError>,
}

struct BackendSession {
    config: Arc<BackendConfig>,
    client: Arc<dyn BackendClient>,
    lifecycle: SessionLifecycle,
}

#[derive(Default)]
struct AggregatorState {
    sessions: HashMap<BackendName, BackendSession>,
    routes: RoutingTable,
    shut_down: bool,
}

/// Merged tool surface over several backend servers.
///
/// Sessions and routes share one reader/writer lock. Listing and call
/// resolution take the read side; session insertion, route registration,
/// and shutdown take the write side. No backend I/O happens while the lock
/// is held.
pub struct Aggregator<K, C>
where
    K: BackendConnector,
    C: Clock + Send + Sync,
{
    connector: Arc<K>,
    clock: Arc<C>,
    client_info: ClientInfo,
    handshake_timeout: Duration,
    state: RwLock<AggregatorState>,
}

impl<K, C> Aggregator<K, C>
where
    K: BackendConnector,
    C: Clock + Send + Sync,
{
    /// Creates an aggregator with no sessions.
    #[must_use]
    pub fn new(connector: Arc<K>, clock: Arc<C>) -> Self {
        Self {
            connector,
            clock,
            client_info: ClientInfo::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            state: RwLock::new(AggregatorState::default()),
        }
    }

    /// Overrides the handshake deadline.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Overrides the identity presented to backends.
    #[must_use]
    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.client_info = client_info;
        self
    }

    /// Connects, handshakes, and discovers every backend in order.
    ///
    /// A backend that fails at any step is logged and skipped; the remaining
    /// backends are still processed. Once [`Aggregator::shutdown`] has run,
    /// every backend is skipped with [`BackendInitError::Interrupted`].
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::NoBackendsAvailable`] when no backend
    /// became active.
    pub async fn initialize(&self, configs: &[BackendConfig]) -> AggregatorResult<InitializeReport> {
        let mut report = InitializeReport::default();

        for config in configs {
            match self.start_backend(config).await {
                Ok(()) => report.active.push(config.name().clone()),
                Err(failure) => {
                    error!(
                        backend = %failure.backend(),
                        error = %failure,
                        "continuing with other servers"
                    );
                    report.failures.push(failure);
                }
            }
        }

        if report.active.is_empty() {
            return Err(AggregatorError::NoBackendsAvailable {
                failures: report.failures,
            });
        }

        info!(
            active = report.active.len(),
            failed = report.failures.len(),
            "aggregator initialized"
        );
        Ok(report)
    }

    /// Returns every registered tool as the upstream caller sees it.
    ///
    /// Order follows the routing table's iteration order and is unspecified.
    #[must_use]
    pub fn list_tools(&self) -> Vec<RemoteTool> {
        self.read_state()
            .routes
            .descriptors()
            .map(ToolDescriptor::exposed)
            .collect()
    }

    /// Resolves a namespaced identifier to the descriptor it routes to.
    #[must_use]
    pub fn route(&self, namespaced_name: &str) -> Option<ToolDescriptor> {
        self.read_state().routes.resolve(namespaced_name).cloned()
    }

    /// Returns a snapshot of every live session, ordered by backend name.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<SessionSnapshot> = self
            .read_state()
            .sessions
            .values()
            .map(|session| session.lifecycle.snapshot())
            .collect();
        snapshots.sort_by(|left, right| left.backend.cmp(&right.backend));
        snapshots
    }

    /// Forwards a call on a namespaced tool to its backend.
    ///
    /// The request is renamed to the tool's original name and otherwise
    /// forwarded unchanged; the backend's result is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::ToolNotFound`] for unknown names,
    /// [`AggregatorError::BackendUnavailable`] when the owning session is
    /// gone, or [`AggregatorError::BackendCall`] with the backend's own
    /// error.
    pub async fn call_tool(&self, request: ToolCallRequest) -> AggregatorResult<ToolCallResult> {
        let (client, descriptor) = {
            let state = self.read_state();
            let descriptor = state.routes.resolve(&request.name).cloned().ok_or_else(|| {
                AggregatorError::ToolNotFound {
                    name: request.name.clone(),
                }
            })?;
            let session = state.sessions.get(descriptor.backend()).ok_or_else(|| {
                AggregatorError::BackendUnavailable {
                    backend: descriptor.backend().clone(),
                }
            })?;
            (Arc::clone(&session.client), descriptor)
        };

        debug!(
            backend = %descriptor.backend(),
            tool = %descriptor.original_name(),
            namespaced = %descriptor.namespaced_name(),
            "calling tool"
        );
        let forwarded = request.renamed(descriptor.original_name());
        Ok(client.call_tool(forwarded).await?)
    }

    /// Closes every session and clears the routing table.
    ///
    /// Close failures are logged; every session is still removed. Backends
    /// still completing their handshake are closed instead of being admitted.
    pub async fn shutdown(&self) {
        let sessions: Vec<BackendSession> = {
            let mut state = self.write_state();
            state.shut_down = true;
            state.routes.clear();
            state.sessions.drain().map(|(_, session)| session).collect()
        };

        let total = sessions.len();
        let mut failed = 0_usize;
        for mut session in sessions {
            let backend = session.lifecycle.backend().clone();
            if let Err(close_error) = session.client.close().await {
                failed += 1;
                warn!(backend = %backend, error = %close_error, "failed to close backend");
            }
            if let Err(transition_error) = session.lifecycle.mark_closed(&*self.clock) {
                debug!(backend = %backend, error = %transition_error, "session already closed");
            }
            debug!(
                backend = %backend,
                command = %session.config.command(),
                "backend session closed"
            );
        }

        info!(closed = total, failed, "shutdown complete");
    }

    async fn start_backend(&self, config: &BackendConfig) -> Result<(), BackendInitError> {
        let backend = config.name().clone();
        let (shut_down, already_live) = {
            let state = self.read_state();
            (state.shut_down, state.sessions.contains_key(&backend))
        };
        if shut_down {
            return Err(BackendInitError::Interrupted { backend });
        }
        if already_live {
            return Err(BackendInitError::DuplicateSession { backend });
        }

        let mut lifecycle = SessionLifecycle::new(backend.clone(), &*self.clock);
        debug!(
            backend = %backend,
            command = %config.command(),
            args = ?config.args(),
            env_keys = ?config.env().keys().collect::<Vec<_>>(),
            "initializing backend"
        );

        let client = self
            .connector
            .connect(config)
            .await
            .map_err(|source| BackendInitError::Construction {
                backend: backend.clone(),
                source,
            })?;
        advance(&backend, lifecycle.mark_connecting(&*self.clock))?;

        let server_info = match self.handshake(&backend, client.as_ref()).await {
            Ok(server_info) => server_info,
            Err(failure) => {
                record_failure(&mut lifecycle, &failure, &*self.clock);
                close_quietly(&backend, client.as_ref()).await;
                return Err(failure);
            }
        };
        info!(
            backend = %backend,
            server_name = %server_info.name,
            server_version = %server_info.version,
            "backend initialized"
        );
        advance(&backend, lifecycle.mark_ready(server_info, &*self.clock))?;
        advance(&backend, lifecycle.mark_discovering(&*self.clock))?;

        let shared_config = Arc::new(config.clone());
        let admitted = {
            let mut state = self.write_state();
            if state.shut_down {
                Err(BackendInitError::Interrupted {
                    backend: backend.clone(),
                })
            } else if state.sessions.contains_key(&backend) {
                Err(BackendInitError::DuplicateSession {
                    backend: backend.clone(),
                })
            } else {
                state.sessions.insert(
                    backend.clone(),
                    BackendSession {
                        config: Arc::clone(&shared_config),
                        client: Arc::clone(&client),
                        lifecycle,
                    },
                );
                Ok(())
            }
        };
        if let Err(rejection) = admitted {
            close_quietly(&backend, client.as_ref()).await;
            return Err(rejection);
        }

        match discover(client.as_ref(), &shared_config).await {
            Ok(catalog) => self.commit_catalog(&backend, catalog),
            Err(source) => {
                self.fail_session(&backend, &source);
                Err(BackendInitError::Discovery { backend, source })
            }
        }
    }

    async fn handshake(
        &self,
        backend: &BackendName,
        client: &dyn BackendClient,
    ) -> Result<ServerInfo, BackendInitError> {
        debug!(backend = %backend, timeout = ?self.handshake_timeout, "sending initialize request");
        match tokio::time::timeout(self.handshake_timeout, client.handshake(&self.client_info)).await
        {
            Ok(Ok(server_info)) => Ok(server_info),
            Ok(Err(source)) => {
                error!(backend = %backend, error = %source, "failed to initialize server");
                Err(BackendInitError::Handshake {
                    backend: backend.clone(),
                    source,
                })
            }
            Err(_) => {
                error!(
                    backend = %backend,
                    timeout = ?self.handshake_timeout,
                    "initialize request timed out, skipping server"
                );
                Err(BackendInitError::HandshakeTimeout {
                    backend: backend.clone(),
                    timeout: self.handshake_timeout,
                })
            }
        }
    }

    fn commit_catalog(
        &self,
        backend: &BackendName,
        catalog: DiscoveredCatalog,
    ) -> Result<(), BackendInitError> {
        let mut state = self.write_state();
        let AggregatorState {
            sessions, routes, ..
        } = &mut *state;
        let Some(session) = sessions.get_mut(backend) else {
            return Err(BackendInitError::Interrupted {
                backend: backend.clone(),
            });
        };

        let mut displaced = HashSet::new();
        for descriptor in catalog.descriptors {
            let original = descriptor.original_name().to_owned();
            let namespaced = descriptor.namespaced_name().to_owned();
            match routes.register(descriptor) {
                Registration::New | Registration::Refreshed => {
                    debug!(backend = %backend, tool = %original, namespaced = %namespaced, "registered tool");
                }
                Registration::ReplacedSibling { previous_tool } => warn!(
                    backend = %backend,
                    tool = %original,
                    previous_tool = %previous_tool,
                    namespaced = %namespaced,
                    "tool names collide after sanitizing, keeping the later one"
                ),
                Registration::ReplacedForeign {
                    previous_backend,
                    previous_tool,
                } => {
                    warn!(
                        backend = %backend,
                        tool = %original,
                        previous_backend = %previous_backend,
                        previous_tool = %previous_tool,
                        namespaced = %namespaced,
                        "namespaced identifier already owned by another backend, replacing it"
                    );
                    displaced.insert(previous_backend);
                }
            }
        }

        let registered = routes.count_for(backend);
        advance(backend, session.lifecycle.mark_active(registered, &*self.clock))?;
        for previous_backend in displaced {
            if let Some(previous) = sessions.get_mut(&previous_backend) {
                previous
                    .lifecycle
                    .refresh_tool_count(routes.count_for(&previous_backend), &*self.clock);
            }
        }
        debug!(
            backend = %backend,
            reported = catalog.reported,
            registered,
            "tool discovery complete"
        );
        Ok(())
    }

    fn fail_session(&self, backend: &BackendName, reason: &BackendClientError) {
        let mut state = self.write_state();
        if let Some(session) = state.sessions.get_mut(backend)
            && let Err(transition_error) = session
                .lifecycle
                .mark_failed(reason.to_string(), &*self.clock)
        {
            warn!(backend = %backend, error = %transition_error, "could not mark session failed");
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, AggregatorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, AggregatorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn advance(
    backend: &BackendName,
    transition: Result<(), AggregatorDomainError>,
) -> Result<(), BackendInitError> {
    transition.map_err(|source| BackendInitError::Lifecycle {
        backend: backend.clone(),
        source,
    })
}

fn record_failure(lifecycle: &mut SessionLifecycle, failure: &BackendInitError, clock: &impl Clock) {
    if let Err(transition_error) = lifecycle.mark_failed(failure.to_string(), clock) {
        debug!(backend = %failure.backend(), error = %transition_error, "could not mark session failed");
    }
}

async fn close_quietly(backend: &BackendName, client: &dyn BackendClient) {
    if let Err(close_error) = client.close().await {
        warn!(backend = %backend, error = %close_error, "failed to close client");
    }
}
