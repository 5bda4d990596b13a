//! Connection lifecycle as seen from outside the manager
//!
//! ```text
//! Absent --(command connects)--> Open
//! Open --(idle timeout | close | timeout or fault mid-command)--> Absent
//! Open --(peer EOF noticed by the next command)--> Absent --> Open
//! ```
//!
//! There is no separate "closed" state: a closed handle is dropped on the
//! spot, so the next command always finds `Absent` and dials again.

use std::fmt;

/// Whether the manager currently holds a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; the next command will connect
    Absent,
    /// A socket is held and will be reused if still healthy
    Open,
}

impl ConnectionState {
    /// Numeric value reported on the connection-state gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            ConnectionState::Absent => 0,
            ConnectionState::Open => 1,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Absent => f.write_str("absent"),
            ConnectionState::Open => f.write_str("open"),
        }
    }
}
