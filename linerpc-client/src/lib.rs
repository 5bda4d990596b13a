//! Line-delimited JSON-RPC 2.0 client over a raw TCP socket
//!
//! The client keeps a single connection to a data source. It connects on the
//! first command, reuses the socket for later ones, closes it after a period
//! of inactivity and transparently reconnects when the socket is gone.
//!
//! # Core Features
//!
//! - **Lazy connect**: nothing is dialed until the first command
//! - **Reuse with staleness checks**: a peer hang-up is noticed before the
//!   next request goes out
//! - **Idle close**: a keepalive timer, restarted by every command
//! - **Bounded I/O**: connect, flush and read each have a deadline; a stalled
//!   exchange closes the socket
//! - **Serialized access**: concurrent callers take turns on the one socket
//! - **Observability**: `tracing` events and optional OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use linerpc_client::ConnectionManager;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = ConnectionManager::new("127.0.0.1", 8888);
//!
//!     let reply = source.command("status").await?;
//!     println!("Result: {:?}", reply.get("result"));
//!
//!     source.shutdown().await;
//!     Ok(())
//! }
//! ```

mod client_builder;
mod connection;
mod connection_state;
mod idle;
mod manager;
mod metrics;

pub use client_builder::ClientBuilder;
pub use connection::CloseReason;
pub use connection_state::ConnectionState;
pub use manager::ConnectionManager;
pub use metrics::ClientMetrics;
