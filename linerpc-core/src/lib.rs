//! Core pieces for line-delimited JSON-RPC 2.0 over TCP
//!
//! This crate holds everything the client needs that is not connection
//! state:
//!
//! - **Types**: the request envelope and protocol constants
//! - **Codec**: newline framing, response parsing, envelope stripping
//! - **Error handling**: the error kinds a command can fail with
//! - **Settings**: source address/port and the two timing knobs
//! - **Observability**: `tracing` subscriber and optional OTLP export
//!
//! The `linerpc-client` crate builds the idle-aware connection manager on
//! top of these.
//!
//! # Example
//!
//! ```rust
//! use linerpc_core::{codec, RequestEnvelope};
//!
//! let request = RequestEnvelope::new(codec::generate_id(), "ping");
//! let line = codec::encode_line(&request).unwrap();
//! assert!(line.ends_with(b"\n"));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod settings;
pub mod types;

pub use error::{Error, IoStage, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use settings::SourceSettings;
pub use types::{RequestEnvelope, ENVELOPE_FIELDS, JSONRPC_VERSION, MAX_LINE_BYTES, MAX_REQUEST_ID};
