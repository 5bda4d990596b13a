//! Logging and OpenTelemetry setup
//!
//! The client itself only emits `tracing` events: connection established and
//! closed at `info`, state decisions at `debug`, request and response bodies
//! at `trace`. This module installs a subscriber for those events and, when
//! an OTLP endpoint is configured, exports spans and metrics to a collector.
//!
//! Initialization is fallible and never panics: a second call returns an
//! error instead of replacing the global subscriber.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter; wins over [`ObservabilityConfig::log_level`]
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: enables OTLP export when set
//!
//! # Examples
//!
//! ```rust,no_run
//! use linerpc_core::ObservabilityConfig;
//!
//! let config = ObservabilityConfig::new("source-api")
//!     .with_log_level("linerpc_client=debug,info");
//! linerpc_core::init_observability(config).expect("logging already initialized");
//! ```

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider, Tracer};
use opentelemetry_sdk::Resource;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Providers installed by [`init_observability`], kept for shutdown
struct Providers {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
}

static PROVIDERS: OnceLock<Providers> = OnceLock::new();

/// How logs are formatted and where telemetry goes
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// `service.name` resource attribute
    pub service_name: String,
    /// `service.version` resource attribute
    pub service_version: String,
    /// OTLP/gRPC collector; `None` keeps everything local
    pub otlp_endpoint: Option<String>,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "linerpc".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            log_level: "info".to_string(),
            json: true,
        }
    }
}

impl ObservabilityConfig {
    /// Defaults with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Export to an OTLP collector
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Keep all telemetry local
    pub fn without_export(mut self) -> Self {
        self.otlp_endpoint = None;
        self
    }

    /// Set the fallback filter directive
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the reported service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Toggle JSON output
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the global subscriber and, if configured, the OTLP providers
///
/// Logs go to stderr so binaries can keep stdout for their own output.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let tracer = match &config.otlp_endpoint {
        Some(endpoint) => Some(init_providers(&config, endpoint)?),
        None => None,
    };
    let telemetry_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    if config.json {
        tracing_subscriber::registry()
            .with(telemetry_layer)
            .with(env_filter)
            .with(fmt_layer.json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(telemetry_layer)
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        "Observability initialized"
    );
    Ok(())
}

fn init_providers(config: &ObservabilityConfig, endpoint: &str) -> Result<Tracer, BoxError> {
    use opentelemetry::trace::TracerProvider as _;

    if PROVIDERS.get().is_some() {
        return Err("OpenTelemetry providers are already installed".into());
    }

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let reader = PeriodicReader::builder(metric_exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();
    let meter_provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    let tracer = tracer_provider.tracer(config.service_name.clone());
    global::set_tracer_provider(tracer_provider.clone());
    global::set_meter_provider(meter_provider.clone());

    // Losing this race only means the other caller's providers get flushed.
    let _ = PROVIDERS.set(Providers {
        tracer: tracer_provider,
        meter: meter_provider,
    });
    Ok(tracer)
}

/// Flush and shut down the OTLP providers, if any were installed
///
/// Safe to call more than once and safe to call without a prior init.
pub fn shutdown_observability() {
    let Some(providers) = PROVIDERS.get() else {
        return;
    };

    if let Err(e) = providers.tracer.shutdown() {
        tracing::debug!(error = %e, "Tracer provider shutdown");
    }
    if let Err(e) = providers.meter.shutdown() {
        tracing::debug!(error = %e, "Meter provider shutdown");
    }
}
