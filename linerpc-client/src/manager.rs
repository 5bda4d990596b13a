//! Lazily-connected, idle-aware manager for one source connection
//!
//! [`ConnectionManager`] owns at most one TCP connection to the source. Each
//! command:
//!
//! 1. cancels the pending idle-close timer,
//! 2. reuses the held connection, or dials a new one if there is none or the
//!    peer has hung up,
//! 3. schedules a fresh idle-close timer,
//! 4. writes one request line and reads one response line, each bounded by
//!    the connection timeout.
//!
//! A timeout or socket fault during step 4 closes the connection before the
//! error is returned, so the next command always starts on a fresh socket.
//!
//! # Concurrency
//!
//! The whole exchange runs under one async mutex. Clones share the same
//! connection, and concurrent callers are served one after another instead of
//! interleaving their lines on the socket. The idle-close task takes the same
//! lock before it closes anything.

use crate::connection::{CloseReason, ConnectionHandle};
use crate::idle::IdleTimer;
use crate::{ClientBuilder, ClientMetrics, ConnectionState};
use linerpc_core::{codec, Error, IoStage, RequestEnvelope, Result, SourceSettings};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Mutable state, only ever touched with the lock held
#[derive(Default)]
struct Inner {
    connection: Option<ConnectionHandle>,
    idle_close: Option<IdleTimer>,
}

/// Client for a line-delimited JSON-RPC source
///
/// Cheap to clone; all clones share one connection.
///
/// # Examples
///
/// ```rust,no_run
/// use linerpc_client::ConnectionManager;
///
/// # async fn example() -> linerpc_core::Result<()> {
/// let source = ConnectionManager::new("127.0.0.1", 8888);
/// let status = source.command("status").await?;
/// println!("{status:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    address: Arc<str>,
    port: u16,
    timeout: Duration,
    keepalive: Duration,
    max_line: usize,
    inner: Arc<Mutex<Inner>>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ConnectionManager {
    /// Manager for `address:port` with default timeout and keepalive
    ///
    /// Nothing is dialed until the first command.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self::from_settings(&SourceSettings::new(address, port))
    }

    /// Manager configured from loaded settings
    pub fn from_settings(settings: &SourceSettings) -> Self {
        Self::with_parts(settings, None)
    }

    /// Start a [`ClientBuilder`] for `address:port`
    pub fn builder(address: impl Into<String>, port: u16) -> ClientBuilder {
        ClientBuilder::new(address, port)
    }

    pub(crate) fn with_parts(settings: &SourceSettings, metrics: Option<Arc<ClientMetrics>>) -> Self {
        Self {
            address: Arc::from(settings.source_address.as_str()),
            port: settings.source_port,
            timeout: settings.connection_timeout,
            keepalive: settings.connection_keepalive,
            max_line: settings.max_line_bytes,
            inner: Arc::new(Mutex::new(Inner::default())),
            metrics,
        }
    }

    /// Target host
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Target port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Deadline for connect, flush and read
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Idle time before the connection is closed
    pub fn keepalive(&self) -> Duration {
        self.keepalive
    }

    /// Longest response line accepted, newline included
    pub fn max_line_bytes(&self) -> usize {
        self.max_line
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Send `method` and return the response with `id`/`jsonrpc` removed
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] / [`Error::Transport`] if no connection
    ///   could be established
    /// - [`Error::CommandTimeout`] if the flush or the read stalled; the
    ///   connection has been closed
    /// - [`Error::Transport`] if the socket failed mid-exchange; the
    ///   connection has been closed
    /// - [`Error::MalformedResponse`] if the reply was not a JSON object; the
    ///   connection is kept unless the line was over the length cap
    ///
    /// Dropping the returned future after the request went out leaves the
    /// connection owing a reply; the next command discards it and dials anew.
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint()))]
    pub async fn command(&self, method: &str) -> Result<Map<String, Value>> {
        let start = Instant::now();
        let result = self.run_command(method).await;
        let duration = start.elapsed().as_secs_f64();

        match &result {
            Ok(_) => {
                if let Some(ref m) = self.metrics {
                    m.record_command(method, "success", duration);
                }
                tracing::debug!(duration_secs = duration, "Command completed");
            }
            Err(e) => {
                if let Some(ref m) = self.metrics {
                    m.record_command(method, "error", duration);
                    m.record_error(e.kind());
                }
                tracing::warn!(error = %e, duration_secs = duration, "Command failed");
            }
        }

        result
    }

    /// [`command`](Self::command), deserializing the stripped payload into `R`
    pub async fn command_as<R>(&self, method: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let payload = self.command(method).await?;
        serde_json::from_value(Value::Object(payload))
            .map_err(|e| Error::MalformedResponse(e.to_string()))
    }

    async fn run_command(&self, method: &str) -> Result<Map<String, Value>> {
        let request = RequestEnvelope::new(codec::generate_id(), method);
        let line = codec::encode_line(&request)?;

        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await?;

        let exchanged = match inner.connection.as_mut() {
            Some(connection) => self.exchange(connection, method, &line).await,
            None => Err(Error::Transport("no connection available".into())),
        };

        let response = match exchanged {
            Ok(response) => response,
            Err(e) => {
                let unfinished = inner
                    .connection
                    .as_ref()
                    .is_some_and(ConnectionHandle::awaiting_reply);
                if e.closes_connection() || unfinished {
                    self.close_locked(&mut inner, CloseReason::Error).await;
                }
                return Err(e);
            }
        };
        drop(inner);

        codec::decode_response(&response)
    }

    /// Make sure a usable connection is held and restart the idle clock
    async fn ensure_connected(&self, inner: &mut Inner) -> Result<()> {
        if let Some(timer) = inner.idle_close.take() {
            timer.cancel();
        }

        let stale = match inner.connection.as_mut() {
            Some(connection) => connection.is_stale(),
            None => true,
        };

        if stale {
            if inner.connection.is_some() {
                self.close_locked(inner, CloseReason::Stale).await;
            }

            tracing::info!(endpoint = %self.endpoint(), "Establishing new connection");
            let connection = ConnectionHandle::open(&self.address, self.port, self.timeout)
                .await?
                .with_max_line(self.max_line);
            tracing::info!(peer = %connection.peer(), "Connection established");

            if let Some(ref m) = self.metrics {
                m.record_connection_opened();
            }
            inner.connection = Some(connection);
        } else {
            tracing::debug!("Reusing open connection");
        }

        inner.idle_close = Some(self.schedule_idle_close());
        Ok(())
    }

    fn schedule_idle_close(&self) -> IdleTimer {
        let inner: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let keepalive = self.keepalive;
        let metrics = self.metrics.clone();

        IdleTimer::schedule(keepalive, async move {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut inner = inner.lock().await;
            if let Some(connection) = inner.connection.take() {
                connection.close().await;
                if let Some(ref m) = metrics {
                    m.record_connection_closed(CloseReason::Idle);
                }
                tracing::info!(keepalive_secs = keepalive.as_secs_f64(), "Connection closed after idle period");
            }
        })
    }

    /// Write the request line, then read one response line
    async fn exchange(
        &self,
        connection: &mut ConnectionHandle,
        method: &str,
        line: &[u8],
    ) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let timed_out = |stage| Error::CommandTimeout {
            method: method.to_string(),
            stage,
            timeout,
        };

        tracing::trace!(body = %String::from_utf8_lossy(line).trim_end(), "write");
        match tokio::time::timeout(timeout, connection.write_line(line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Transport(format!("write failed: {e}"))),
            Err(_) => return Err(timed_out(IoStage::Writing)),
        }

        let response = match tokio::time::timeout(timeout, connection.read_line()).await {
            Ok(Ok(Some(response))) => response,
            Ok(Ok(None)) => {
                return Err(Error::Transport(
                    "connection closed by peer before a response arrived".into(),
                ))
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(timed_out(IoStage::Reading)),
        };
        tracing::trace!(body = %String::from_utf8_lossy(&response).trim_end(), "read");

        Ok(response)
    }

    /// Close the connection if one is held
    ///
    /// Idempotent: closing an absent connection does nothing. A pending idle
    /// timer is left alone; when it fires it finds nothing to close.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        self.close_locked(&mut inner, CloseReason::Explicit).await;
    }

    /// Cancel the idle timer and close the connection
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(timer) = inner.idle_close.take() {
            timer.cancel();
        }
        self.close_locked(&mut inner, CloseReason::Explicit).await;
    }

    async fn close_locked(&self, inner: &mut Inner, reason: CloseReason) {
        let Some(connection) = inner.connection.take() else {
            return;
        };
        let peer = connection.peer();
        connection.close().await;

        if let Some(ref m) = self.metrics {
            m.record_connection_closed(reason);
        }
        tracing::info!(%peer, %reason, "Connection closed");
    }

    /// Whether a connection is currently held
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.connection.is_some()
    }

    /// Current lifecycle state
    pub async fn connection_state(&self) -> ConnectionState {
        if self.is_connected().await {
            ConnectionState::Open
        } else {
            ConnectionState::Absent
        }
    }

    /// Whether an idle-close is scheduled and has not fired yet
    pub async fn idle_close_pending(&self) -> bool {
        self.inner
            .lock()
            .await
            .idle_close
            .as_ref()
            .is_some_and(IdleTimer::is_pending)
    }

    /// When the pending idle-close will fire, if one is scheduled
    pub async fn idle_deadline(&self) -> Option<tokio::time::Instant> {
        self.inner
            .lock()
            .await
            .idle_close
            .as_ref()
            .filter(|timer| timer.is_pending())
            .map(IdleTimer::deadline)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint())
            .field("timeout", &self.timeout)
            .field("keepalive", &self.keepalive)
            .field("max_line", &self.max_line)
            .finish_non_exhaustive()
    }
}
