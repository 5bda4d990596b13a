//! Send one or more method-only commands to a source and print the replies
//!
//! Settings come from the environment (`SOURCE_ADDRESS`, `SOURCE_PORT`,
//! `CONNECTION_TIMEOUT`, `CONNECTION_KEEPALIVE`). Each reply is printed to
//! stdout as one JSON line; logs go to stderr.
//!
//! ```bash
//! SOURCE_PORT=7000 RUST_LOG=linerpc_client=debug linerpc-call status version
//! ```

use linerpc::core::ObservabilityConfig;
use linerpc::ClientBuilder;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let methods: Vec<String> = std::env::args().skip(1).collect();
    if methods.is_empty() {
        eprintln!("usage: linerpc-call <method> [<method>...]");
        return ExitCode::from(2);
    }

    let builder = match ClientBuilder::from_env() {
        Ok(builder) => builder,
        Err(e) => {
            eprintln!("linerpc-call: {e}");
            return ExitCode::from(2);
        }
    };
    let source = match builder
        .with_observability(ObservabilityConfig::new("linerpc-call").with_json(false))
        .build()
    {
        Ok(source) => source,
        Err(e) => {
            eprintln!("linerpc-call: {e}");
            return ExitCode::from(2);
        }
    };

    let mut status = ExitCode::SUCCESS;
    for method in &methods {
        match source.command(method).await {
            Ok(reply) => println!("{}", serde_json::Value::Object(reply)),
            Err(e) => {
                tracing::error!(%method, error = %e, "Command failed");
                eprintln!("linerpc-call: {method}: {e}");
                status = ExitCode::FAILURE;
            }
        }
    }

    source.shutdown().await;
    linerpc::core::shutdown_observability();
    status
}
