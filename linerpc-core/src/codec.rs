//! Line codec for the JSON-RPC exchange
//!
//! A request is one compact JSON object followed by a single `\n`. A response
//! is one line holding a JSON object; the codec parses it and removes the
//! protocol envelope so callers only see their payload.
//!
//! # Examples
//!
//! ```rust
//! use linerpc_core::{codec, RequestEnvelope};
//!
//! let line = codec::encode_line(&RequestEnvelope::new(3, "ping")).unwrap();
//! assert!(line.ends_with(b"\n"));
//!
//! let payload = codec::decode_response(br#"{"id":3,"jsonrpc":"2.0","result":"ok"}"#).unwrap();
//! assert_eq!(payload.len(), 1);
//! assert_eq!(payload["result"], "ok");
//! ```

use crate::error::{Error, Result};
use crate::types::{RequestEnvelope, ENVELOPE_FIELDS, MAX_REQUEST_ID};
use rand::Rng;
use serde_json::{Map, Value};

/// Draw a request id uniformly from `0..MAX_REQUEST_ID`
///
/// Ids may repeat. Only one request is in flight per connection, so the id
/// is never used to pair responses.
pub fn generate_id() -> u32 {
    rand::thread_rng().gen_range(0..MAX_REQUEST_ID)
}

/// Serialize a request to bytes, newline-terminated
pub fn encode_line(request: &RequestEnvelope) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(request).map_err(|e| Error::Serialization(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}

/// Parse one response line into a JSON object
///
/// A trailing `\n` (or `\r\n`) is ignored. Anything that is not UTF-8 or not
/// a JSON object is a [`Error::MalformedResponse`].
pub fn decode_line(line: &[u8]) -> Result<Map<String, Value>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| Error::MalformedResponse(format!("response is not UTF-8: {e}")))?;
    let text = text.trim_end_matches(['\n', '\r']);

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(Error::MalformedResponse(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
        Err(e) => Err(Error::MalformedResponse(e.to_string())),
    }
}

/// Remove the `id` and `jsonrpc` members, keeping everything else
pub fn strip_envelope(mut object: Map<String, Value>) -> Map<String, Value> {
    for field in ENVELOPE_FIELDS {
        object.remove(field);
    }
    object
}

/// [`decode_line`] followed by [`strip_envelope`]
pub fn decode_response(line: &[u8]) -> Result<Map<String, Value>> {
    decode_line(line).map(strip_envelope)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
