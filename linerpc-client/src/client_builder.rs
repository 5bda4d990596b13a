//! Client builder for configuring timeouts, metrics and observability
//!
//! `ClientBuilder` is the fluent way to assemble a [`ConnectionManager`]:
//! - point it at a source (`new`, or `from_settings` / `from_env`)
//! - tune the connect/flush/read deadline and the idle keepalive
//! - optionally attach metrics and initialize logging/OpenTelemetry
//!
//! Building never touches the network; the first command dials.
//!
//! # Examples
//!
//! ```rust,no_run
//! use linerpc_client::ClientBuilder;
//! use std::time::Duration;
//!
//! # fn example() -> linerpc_core::Result<()> {
//! let source = ClientBuilder::new("10.0.0.4", 7000)
//!     .timeout(Duration::from_secs(2))
//!     .keepalive(Duration::from_secs(60))
//!     .with_default_observability()
//!     .service_name("source-api")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::{ClientMetrics, ConnectionManager};
use linerpc_core::{Error, ObservabilityConfig, Result, SourceSettings};
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a ConnectionManager
pub struct ClientBuilder {
    settings: SourceSettings,
    metrics: Option<Arc<ClientMetrics>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Builder for `address:port` with default timings
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self::from_settings(SourceSettings::new(address, port))
    }

    /// Builder seeded from already-loaded settings
    pub fn from_settings(settings: SourceSettings) -> Self {
        Self {
            settings,
            metrics: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Builder seeded from `SOURCE_*` / `CONNECTION_*` environment variables
    pub fn from_env() -> Result<Self> {
        SourceSettings::from_env().map(Self::from_settings)
    }

    /// Deadline for connect, flush and read
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.connection_timeout = timeout;
        self
    }

    /// Idle time before an unused connection is closed
    pub fn keepalive(mut self, keepalive: Duration) -> Self {
        self.settings.connection_keepalive = keepalive;
        self
    }

    /// Longest response line accepted, newline included
    pub fn max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.settings.max_line_bytes = max_line_bytes;
        self
    }

    /// Record metrics on the given instruments
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Initialize logging/OpenTelemetry with a custom configuration on build
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Initialize logging/OpenTelemetry with the default configuration on build
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// The settings the manager will be built with
    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    /// Validate settings, set up observability if asked, and create the manager
    pub fn build(self) -> Result<ConnectionManager> {
        self.settings.validate()?;

        let mut metrics = self.metrics;
        if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            linerpc_core::init_observability(config.clone()).map_err(|e| {
                Error::Config(format!("Failed to initialize observability: {e}"))
            })?;

            if metrics.is_none() {
                metrics = Some(Arc::new(ClientMetrics::new(config.service_name)));
            }
        }

        tracing::debug!(
            endpoint = %self.settings.endpoint(),
            timeout_secs = self.settings.connection_timeout.as_secs_f64(),
            keepalive_secs = self.settings.connection_keepalive.as_secs_f64(),
            "Connection manager configured"
        );
        Ok(ConnectionManager::with_parts(&self.settings, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new("127.0.0.1", 8888);

        assert_eq!(builder.settings().endpoint(), "127.0.0.1:8888");
        assert_eq!(builder.settings().connection_timeout, Duration::from_secs(5));
        assert_eq!(builder.settings().connection_keepalive, Duration::from_secs(30));
        assert!(builder.metrics.is_none());
        assert!(builder.observability_config.is_none());
        assert!(builder.service_name.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let builder = ClientBuilder::new("source.local", 7000)
            .timeout(Duration::from_millis(250))
            .keepalive(Duration::from_secs(90))
            .service_name("source-api")
            .with_default_observability();

        assert_eq!(builder.settings().connection_timeout, Duration::from_millis(250));
        assert_eq!(builder.settings().connection_keepalive, Duration::from_secs(90));
        assert_eq!(builder.service_name.as_deref(), Some("source-api"));
        assert!(builder.observability_config.is_some());
    }

    #[test]
    fn test_build_applies_settings() {
        let manager = ClientBuilder::new("source.local", 7000)
            .timeout(Duration::from_secs(1))
            .keepalive(Duration::from_secs(3))
            .build()
            .unwrap();

        assert_eq!(manager.address(), "source.local");
        assert_eq!(manager.port(), 7000);
        assert_eq!(manager.timeout(), Duration::from_secs(1));
        assert_eq!(manager.keepalive(), Duration::from_secs(3));
    }

    #[test]
    fn test_build_rejects_invalid_settings() {
        let result = ClientBuilder::new("", 7000).build();
        assert!(matches!(result, Err(Error::Config(_))));

        let result = ClientBuilder::new("127.0.0.1", 7000)
            .keepalive(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_applies_line_cap() {
        let manager = ClientBuilder::new("127.0.0.1", 7000)
            .max_line_bytes(512)
            .build()
            .unwrap();
        assert_eq!(manager.max_line_bytes(), 512);

        let result = ClientBuilder::new("127.0.0.1", 7000).max_line_bytes(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_with_metrics() {
        let metrics = Arc::new(ClientMetrics::new("builder-test"));
        let manager = ClientBuilder::new("127.0.0.1", 7000)
            .with_metrics(metrics)
            .build();

        assert!(manager.is_ok());
    }

    #[test]
    fn test_from_settings_keeps_everything() {
        let settings = SourceSettings::new("10.1.2.3", 4444)
            .with_timeout(Duration::from_millis(750))
            .with_keepalive(Duration::from_secs(12));
        let builder = ClientBuilder::from_settings(settings.clone());

        assert_eq!(builder.settings(), &settings);
    }
}
