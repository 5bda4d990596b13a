//! Client metrics definitions
//!
//! OpenTelemetry instruments describing how the connection manager behaves.
//! Without an installed meter provider every instrument is a no-op, so
//! attaching metrics never changes what a command returns.
//!
//! # Metrics Collected
//!
//! - **connection_state**: 0 = absent, 1 = open (gauge)
//! - **commands_total**: commands issued, by method and status (counter)
//! - **command_duration**: end-to-end command latency in seconds (histogram)
//! - **errors_total**: failed commands, by error kind (counter)
//! - **connections_opened**: TCP connects that succeeded (counter)
//! - **connections_closed**: teardowns, by reason (counter)
//!
//! # Examples
//!
//! ```rust
//! use linerpc_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new("source-api");
//! metrics.record_command("status", "success", 0.004);
//! ```

use crate::connection::CloseReason;
use crate::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=absent, 1=open)
    pub connection_state: Gauge<i64>,
    /// Total number of commands issued
    pub commands_total: Counter<u64>,
    /// Command duration in seconds
    pub command_duration: Histogram<f64>,
    /// Total number of failed commands
    pub errors_total: Counter<u64>,
    /// Total number of connections established
    pub connections_opened: Counter<u64>,
    /// Total number of connections closed
    pub connections_closed: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("linerpc.client.connection.state")
                .with_description("Connection state (0=absent, 1=open)")
                .build(),
            commands_total: meter
                .u64_counter("linerpc.client.commands.total")
                .with_description("Total number of commands issued")
                .build(),
            command_duration: meter
                .f64_histogram("linerpc.client.command.duration")
                .with_description("Command duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("linerpc.client.errors.total")
                .with_description("Total number of failed commands")
                .build(),
            connections_opened: meter
                .u64_counter("linerpc.client.connections.opened")
                .with_description("Total number of TCP connections established")
                .build(),
            connections_closed: meter
                .u64_counter("linerpc.client.connections.closed")
                .with_description("Total number of TCP connections closed")
                .build(),
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_gauge(), &[]);
    }

    /// Record a finished command
    pub fn record_command(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.commands_total.add(1, attributes);
        self.command_duration.record(duration_secs, attributes);
    }

    /// Record a failed command by error kind
    pub fn record_error(&self, kind: &str) {
        let attributes = &[KeyValue::new("error_type", kind.to_string())];
        self.errors_total.add(1, attributes);
    }

    /// Record a new TCP connection
    pub fn record_connection_opened(&self) {
        self.connections_opened.add(1, &[]);
        self.update_connection_state(ConnectionState::Open);
    }

    /// Record a teardown
    pub fn record_connection_closed(&self, reason: CloseReason) {
        self.connections_closed
            .add(1, &[KeyValue::new("reason", reason.as_str())]);
        self.update_connection_state(ConnectionState::Absent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_sdk::metrics::SdkMeterProvider;

    #[test]
    fn test_metrics_creation() {
        let metrics = ClientMetrics::new("test-client");

        metrics.update_connection_state(ConnectionState::Open);
        metrics.record_command("status", "success", 0.05);
        metrics.record_error("command_timeout");
        metrics.record_connection_opened();
        metrics.record_connection_closed(CloseReason::Idle);
    }

    #[test]
    fn test_metrics_on_sdk_meter() {
        let provider = SdkMeterProvider::builder().build();
        let meter = provider.meter("linerpc-test");
        let metrics = ClientMetrics::new_with_meter(&meter);

        for reason in [
            CloseReason::Idle,
            CloseReason::Error,
            CloseReason::Stale,
            CloseReason::Explicit,
        ] {
            metrics.record_connection_opened();
            metrics.record_connection_closed(reason);
        }
        metrics.record_command("ping", "error", 0.2);

        let _ = provider.shutdown();
    }
}
