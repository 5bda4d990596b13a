//! Wire types for line-delimited JSON-RPC 2.0
//!
//! Only the request side needs a typed shape: a method-only call with a
//! numeric id. Responses are free-form objects whose envelope fields get
//! stripped by [`crate::codec::strip_envelope`].

use serde::{Deserialize, Serialize};

/// Protocol version sent in every request
pub const JSONRPC_VERSION: &str = "2.0";

/// Request ids are drawn from `0..MAX_REQUEST_ID`
pub const MAX_REQUEST_ID: u32 = 5000;

/// Default cap on one response line, newline included
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Response fields that belong to the protocol, not the caller
pub const ENVELOPE_FIELDS: [&str; 2] = ["id", "jsonrpc"];

/// JSON-RPC 2.0 request as written to the socket
///
/// Field order matches the serialized form: `{"id":..,"jsonrpc":"2.0","method":..}`.
/// There is deliberately no `params` member.
///
/// # Examples
///
/// ```rust
/// use linerpc_core::RequestEnvelope;
///
/// let request = RequestEnvelope::new(7, "ping");
/// assert_eq!(request.jsonrpc, "2.0");
/// assert_eq!(request.method, "ping");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Identifier echoed back by the server; not used for correlation
    pub id: u32,
    /// Always "2.0"
    pub jsonrpc: String,
    /// Name of the remote method
    pub method: String,
}

impl RequestEnvelope {
    /// Create a request envelope for `method` with the given id
    pub fn new(id: u32, method: impl Into<String>) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
        }
    }
}
