//! Line-delimited JSON-RPC transport over an async byte stream pair.

use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::aggregator::ports::{BackendClientError, BackendClientResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type PendingRequests = Arc<Mutex<PendingState>>;

#[derive(Default)]
struct PendingState {
    waiting: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    closed: bool,
}

/// JSON-RPC peer connection.
///
/// Requests may be issued concurrently: a background task reads the
/// response stream and hands each response to the request with the same
/// identifier. Lines that are not responses are skipped. When the stream
/// ends, every outstanding request fails with [`BackendClientError::Closed`].
pub struct JsonRpcTransport {
    backend: String,
    writer: AsyncMutex<Option<BoxedWriter>>,
    pending: PendingRequests,
    next_id: AtomicU64,
    reader_task: JoinHandle<()>,
}

impl JsonRpcTransport {
    /// Starts reading responses from `reader`; requests are written to
    /// `writer`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<R, W>(backend: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let backend_name = backend.into();
        let pending = PendingRequests::default();
        let reader_task = tokio::spawn(read_responses(
            backend_name.clone(),
            reader,
            Arc::clone(&pending),
        ));

        Self {
            backend: backend_name,
            writer: AsyncMutex::new(Some(Box::new(writer))),
            pending,
            next_id: AtomicU64::new(1),
            reader_task,
        }
    }

    /// Sends a request and waits for its response's result payload.
    ///
    /// # Errors
    ///
    /// Returns [`BackendClientError::Rpc`] when the peer answers with an
    /// error, [`BackendClientError::Transport`] when writing fails, or
    /// [`BackendClientError::Closed`] when the connection ends first.
    pub async fn request(&self, method: &str, params: Option<Value>) -> BackendClientResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = lock_pending(&self.pending);
            if pending.closed {
                return Err(BackendClientError::Closed);
            }
            pending.waiting.insert(id, sender);
        }
        let _waiter = WaiterGuard {
            pending: &self.pending,
            id,
        };

        trace!(backend = %self.backend, id, method, "sending request");
        self.send(&JsonRpcRequest::new(id, method, params)).await?;

        let response = receiver.await.map_err(|_| BackendClientError::Closed)?;
        response.into_result()
    }

    /// Sends a notification; no response is expected.
    ///
    /// # Errors
    ///
    /// Returns [`BackendClientError::Transport`] when writing fails or
    /// [`BackendClientError::Closed`] after [`JsonRpcTransport::close_writer`].
    pub async fn notify(&self, method: &str, params: Option<Value>) -> BackendClientResult<()> {
        trace!(backend = %self.backend, method, "sending notification");
        self.send(&JsonRpcNotification::new(method, params)).await
    }

    /// Closes the outgoing stream so the peer sees end of input.
    ///
    /// Later writes fail with [`BackendClientError::Closed`].
    pub async fn close_writer(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut stream) = writer
            && let Err(shutdown_error) = stream.shutdown().await
        {
            debug!(backend = %self.backend, error = %shutdown_error, "failed to shut down writer");
        }
    }

    async fn send(&self, message: &impl Serialize) -> BackendClientResult<()> {
        let mut line = serde_json::to_string(message).map_err(|err| {
            BackendClientError::transport(format!("failed to serialize message: {err}"))
        })?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or(BackendClientError::Closed)?;
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|err| BackendClientError::transport(format!("failed to write message: {err}")))?;
        stream
            .flush()
            .await
            .map_err(|err| BackendClientError::transport(format!("failed to flush message: {err}")))
    }
}

/// Removes a request's waiter when the request finishes or is dropped.
struct WaiterGuard<'a> {
    pending: &'a PendingRequests,
    id: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        lock_pending(self.pending).waiting.remove(&self.id);
    }
}

impl Drop for JsonRpcTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_responses<R>(backend: String, reader: R, pending: PendingRequests)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch(&backend, &line, &pending),
            Ok(None) => {
                debug!(backend = %backend, "backend output closed");
                break;
            }
            Err(read_error) => {
                warn!(backend = %backend, error = %read_error, "failed to read backend output");
                break;
            }
        }
    }

    let abandoned = {
        let mut state = lock_pending(&pending);
        state.closed = true;
        let count = state.waiting.len();
        state.waiting.clear();
        count
    };
    if abandoned > 0 {
        debug!(backend = %backend, abandoned, "failing requests left without a response");
    }
}

fn dispatch(backend: &str, line: &str, pending: &PendingRequests) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    let Ok(message) = serde_json::from_str::<Value>(trimmed) else {
        trace!(backend, line = trimmed, "skipping non-JSON output");
        return;
    };
    if let Some(method) = message.get("method").and_then(Value::as_str) {
        trace!(backend, method, "ignoring message initiated by backend");
        return;
    }

    let response = match serde_json::from_value::<JsonRpcResponse>(message) {
        Ok(response) => response,
        Err(parse_error) => {
            debug!(backend, error = %parse_error, "skipping malformed response");
            return;
        }
    };

    let waiter = lock_pending(pending).waiting.remove(&response.id);
    match waiter {
        Some(sender) => {
            if sender.send(response).is_err() {
                trace!(backend, "response arrived after its request was dropped");
            }
        }
        None => debug!(backend, id = response.id, "skipping response with unknown id"),
    }
}

fn lock_pending(pending: &PendingRequests) -> MutexGuard<'_, PendingState> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}
