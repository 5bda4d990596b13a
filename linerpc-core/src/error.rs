//! Error types for linerpc
//!
//! Every failure a command can hit is one variant of [`Error`]. The variants
//! are split along what happens to the underlying TCP connection:
//!
//! - **ConnectionTimeout**: the connect itself did not finish in time. No
//!   connection is held afterwards.
//! - **CommandTimeout** / **Transport**: the exchange broke mid-flight. The
//!   connection is force-closed before the error reaches the caller so the
//!   next command starts on a fresh socket.
//! - **MalformedResponse**: the bytes arrived but were not a JSON object. The
//!   transport is fine, so the connection is kept.
//!
//! Nothing is retried internally. Retry policy belongs to the caller.
//!
//! # Examples
//!
//! ```rust
//! use linerpc_core::{Error, IoStage};
//! use std::time::Duration;
//!
//! let error = Error::CommandTimeout {
//!     method: "status".into(),
//!     stage: IoStage::Reading,
//!     timeout: Duration::from_secs(5),
//! };
//! assert!(error.is_timeout());
//! assert!(error.closes_connection());
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for linerpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// The phase of a command exchange that was running when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStage {
    /// Writing and flushing the request line
    Writing,
    /// Waiting for the response line
    Reading,
}

impl fmt::Display for IoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoStage::Writing => write!(f, "writing request"),
            IoStage::Reading => write!(f, "reading response"),
        }
    }
}

/// Application-level error type for linerpc operations
///
/// Payloads are plain strings so the error stays `Clone` and can be handed
/// to several observers (logs, metrics, the caller) without fuss.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Establishing the TCP connection exceeded its deadline
    ///
    /// The manager holds no connection afterwards; the caller may retry.
    #[error("Connection to {endpoint} timed out after {timeout:?}")]
    ConnectionTimeout {
        /// `host:port` that was being dialed
        endpoint: String,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// Flushing the request or reading the response exceeded its deadline
    ///
    /// The connection has already been closed when this is returned.
    #[error("Command '{method}' timed out {stage} after {timeout:?}")]
    CommandTimeout {
        /// Method of the command that timed out
        method: String,
        /// Which half of the exchange stalled
        stage: IoStage,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// The response line was not UTF-8 or not a JSON object
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Lower-level socket failure (refused, reset, peer hung up)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A request envelope could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Settings could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for both connect and command deadlines
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ConnectionTimeout { .. } | Error::CommandTimeout { .. })
    }

    /// Whether the manager drops its connection when this error surfaces
    /// during an exchange
    pub fn closes_connection(&self) -> bool {
        matches!(self, Error::CommandTimeout { .. } | Error::Transport(_))
    }

    /// Short stable label, used as a metric attribute
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConnectionTimeout { .. } => "connection_timeout",
            Error::CommandTimeout { .. } => "command_timeout",
            Error::MalformedResponse(_) => "malformed_response",
            Error::Transport(_) => "transport",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
