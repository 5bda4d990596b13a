//! linerpc - line-delimited JSON-RPC 2.0 over TCP
//!
//! Convenience crate re-exporting the linerpc sub-crates:
//!
//! - **linerpc-core**: request envelope, line codec, errors, settings, observability
//! - **linerpc-client**: the idle-aware single-connection manager
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use linerpc::{ClientBuilder, SourceSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = ClientBuilder::from_settings(SourceSettings::from_env()?).build()?;
//!
//!     let status = source.command("status").await?;
//!     println!("{}", serde_json::Value::Object(status));
//!
//!     Ok(())
//! }
//! ```

pub use linerpc_client as client;
pub use linerpc_core as core;

pub use linerpc_client::{ClientBuilder, ConnectionManager};
pub use linerpc_core::{Error, Result, SourceSettings};
