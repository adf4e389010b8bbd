use std::time::Duration;

use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{self, Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::util::env::{DEFAULT_LOG_FILTER, Env, LogFormat};

pub type Result<T> = core::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Console logging plus, when a collector endpoint is configured, OTLP export of traces, logs and
/// metrics.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub tracer_name: String,
    pub log_filter: String,
    pub log_format: LogFormat,

    providers: Option<Providers>,
}

#[derive(Debug, Clone)]
struct Providers {
    logger: SdkLoggerProvider,
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
}

impl Telemetry {
    pub fn new(env: &Env) -> Result<Telemetry> {
        let providers = match env.otel_exporter_otlp_endpoint.as_deref() {
            Some(collector_url) => {
                let base_resource =
                    base_attrs(env.api_service_name.clone(), env!("CARGO_PKG_VERSION"));

                Some(Providers {
                    logger: build_logger_provider(collector_url, base_resource.clone())?,
                    tracer: build_tracer_provider(collector_url, base_resource.clone())?,
                    meter: build_meter_provider(collector_url, base_resource)?,
                })
            }
            None => None,
        };

        Ok(Self {
            tracer_name: env.api_tracer_name.clone(),
            log_filter: env.log_filter().to_string(),
            log_format: env.log_format,
            providers,
        })
    }

    pub fn register(self) -> Result<Self> {
        let trace_layer = self.providers.as_ref().map(|p| {
            global::set_tracer_provider(p.tracer.clone());
            let tracer = global::tracer(self.tracer_name.clone());
            tracing_opentelemetry::layer().with_tracer(tracer)
        });
        let log_layer = self
            .providers
            .as_ref()
            .map(|p| OpenTelemetryTracingBridge::new(&p.logger));
        let meter_layer = self
            .providers
            .as_ref()
            .map(|p| tracing_opentelemetry::MetricsLayer::new(p.meter.clone()));

        let filter = EnvFilter::try_new(&self.log_filter).unwrap_or_else(|e| {
            eprintln!("invalid log filter '{}' ({e}), using default", self.log_filter);
            EnvFilter::new(DEFAULT_LOG_FILTER)
        });

        let (pretty_layer, json_layer) = match self.log_format {
            LogFormat::Pretty => (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_line_number(true),
                ),
                None,
            ),
            LogFormat::Json => (
                None,
                Some(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_line_number(true),
                ),
            ),
        };

        tracing_subscriber::registry()
            .with(trace_layer)
            .with(log_layer)
            .with(meter_layer)
            .with(filter)
            .with(pretty_layer)
            .with(json_layer)
            .try_init()?;

        if self.providers.is_some() {
            tracing::info!(tracer = self.tracer_name, "otlp export enabled");
        }

        Ok(self)
    }

    pub fn shutdown(self) {
        let Some(providers) = self.providers else {
            return;
        };

        if let Err(e) = providers.meter.shutdown() {
            eprintln!("error during metering shutdown: {e:?}");
        }

        if let Err(e) = providers.logger.shutdown() {
            eprintln!("error during logging shutdown: {e:?}");
        }

        if let Err(e) = providers.tracer.shutdown() {
            eprintln!("error during tracing shutdown: {e:?}");
        }
    }
}

pub fn build_logger_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkLoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(Endpoint::Logs.to_url(collector_url))
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

pub fn build_tracer_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(Endpoint::Traces.to_url(collector_url))
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

pub fn build_meter_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(Endpoint::Metrics.to_url(collector_url))
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn base_attrs(name: String, version: &'static str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", name),
            KeyValue::new("service.version", version),
        ])
        .build()
}

enum Endpoint {
    Logs,
    Traces,
    Metrics,
}

impl Endpoint {
    pub fn to_url(&self, collector_endpoint: &str) -> String {
        let location: &str = match self {
            Endpoint::Logs => "/v1/logs",
            Endpoint::Traces => "/v1/traces",
            Endpoint::Metrics => "/v1/metrics",
        };
        format!("{}{location}", collector_endpoint.trim_end_matches('/'))
    }
}
