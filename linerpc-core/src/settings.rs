//! Settings for reaching the source
//!
//! Four values drive the client: the source host and port, the deadline used
//! for connect/flush/read, and the keepalive after which an unused connection
//! is closed. A fifth caps the length of a response line. Durations are expressed in (fractional) seconds everywhere they
//! are read from text.
//!
//! # Sources
//!
//! - [`SourceSettings::default`]: built-in defaults
//! - [`SourceSettings::from_env`]: `SOURCE_ADDRESS`, `SOURCE_PORT`,
//!   `CONNECTION_TIMEOUT`, `CONNECTION_KEEPALIVE`, `MAX_LINE_BYTES`
//! - [`SourceSettings::from_file`] / [`SourceSettings::from_toml_str`]: a TOML
//!   table with the same names in lower case
//!
//! # Examples
//!
//! ```rust
//! use linerpc_core::SourceSettings;
//! use std::time::Duration;
//!
//! let settings = SourceSettings::from_toml_str(r#"
//!     source_address = "10.0.0.4"
//!     source_port = 7000
//!     connection_keepalive = 2.5
//! "#).unwrap();
//!
//! assert_eq!(settings.source_port, 7000);
//! assert_eq!(settings.connection_keepalive, Duration::from_millis(2500));
//! assert_eq!(settings.connection_timeout, Duration::from_secs(5));
//! ```

use crate::error::{Error, Result};
use crate::types::MAX_LINE_BYTES;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8888;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// Environment variable names read by [`SourceSettings::from_env`]
pub const ENV_SOURCE_ADDRESS: &str = "SOURCE_ADDRESS";
pub const ENV_SOURCE_PORT: &str = "SOURCE_PORT";
pub const ENV_CONNECTION_TIMEOUT: &str = "CONNECTION_TIMEOUT";
pub const ENV_CONNECTION_KEEPALIVE: &str = "CONNECTION_KEEPALIVE";
pub const ENV_MAX_LINE_BYTES: &str = "MAX_LINE_BYTES";

/// Connection settings, read-only once a manager is built from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    /// Host of the source (name or IP literal)
    pub source_address: String,
    /// TCP port of the source
    pub source_port: u16,
    /// Deadline for connect, write-flush and read-line
    #[serde(with = "seconds")]
    pub connection_timeout: Duration,
    /// Idle time after which an unused connection is closed
    #[serde(with = "seconds")]
    pub connection_keepalive: Duration,
    /// Longest response line accepted, newline included
    pub max_line_bytes: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            source_address: DEFAULT_ADDRESS.to_string(),
            source_port: DEFAULT_PORT,
            connection_timeout: DEFAULT_TIMEOUT,
            connection_keepalive: DEFAULT_KEEPALIVE,
            max_line_bytes: MAX_LINE_BYTES,
        }
    }
}

impl SourceSettings {
    /// Settings for `address:port` with default durations
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            source_address: address.into(),
            source_port: port,
            ..Default::default()
        }
    }

    /// Set the connect/flush/read deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the idle keepalive
    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.connection_keepalive = keepalive;
        self
    }

    /// Set the response line cap
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Set the source host
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = address.into();
        self
    }

    /// Set the source port
    pub fn with_port(mut self, port: u16) -> Self {
        self.source_port = port;
        self
    }

    /// `host:port`, as used in log lines and error messages
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.source_address, self.source_port)
    }

    /// Load from the process environment, falling back to defaults for
    /// unset variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (the environment, a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(address) = lookup(ENV_SOURCE_ADDRESS) {
            settings.source_address = address;
        }
        if let Some(port) = lookup(ENV_SOURCE_PORT) {
            settings.source_port = port.trim().parse().map_err(|e| {
                Error::Config(format!("{ENV_SOURCE_PORT}={port:?} is not a port: {e}"))
            })?;
        }
        if let Some(timeout) = lookup(ENV_CONNECTION_TIMEOUT) {
            settings.connection_timeout = parse_seconds(ENV_CONNECTION_TIMEOUT, &timeout)?;
        }
        if let Some(keepalive) = lookup(ENV_CONNECTION_KEEPALIVE) {
            settings.connection_keepalive = parse_seconds(ENV_CONNECTION_KEEPALIVE, &keepalive)?;
        }
        if let Some(max_line) = lookup(ENV_MAX_LINE_BYTES) {
            settings.max_line_bytes = max_line.trim().parse().map_err(|e| {
                Error::Config(format!("{ENV_MAX_LINE_BYTES}={max_line:?} is not a byte count: {e}"))
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse settings TOML: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a TOML settings file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read settings file '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.source_address.trim().is_empty() {
            return Err(Error::Config("source address is empty".into()));
        }
        if self.source_port == 0 {
            return Err(Error::Config("source port must be non-zero".into()));
        }
        if self.connection_timeout.is_zero() {
            return Err(Error::Config("connection timeout must be positive".into()));
        }
        if self.connection_keepalive.is_zero() {
            return Err(Error::Config("connection keepalive must be positive".into()));
        }
        if self.max_line_bytes == 0 {
            return Err(Error::Config("max line bytes must be positive".into()));
        }
        Ok(())
    }
}

fn parse_seconds(name: &str, raw: &str) -> Result<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name}={raw:?} is not a number of seconds: {e}")))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Config(format!("{name}={raw:?} is not a valid duration: {e}")))
}

/// Serde adapter: `Duration` <-> fractional seconds
mod seconds {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Seconds {
            Int(u64),
            Float(f64),
        }

        match Seconds::deserialize(deserializer)? {
            Seconds::Int(secs) => Ok(Duration::from_secs(secs)),
            Seconds::Float(secs) => Duration::try_from_secs_f64(secs).map_err(de::Error::custom),
        }
    }
}
