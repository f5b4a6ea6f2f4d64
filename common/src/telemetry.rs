// Telemetry module for structured logging, metrics, and tracing

use crate::models::SweepReport;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

const SERVICE_NAME: &str = "event-trigger";

/// Where a firing came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireSource {
    Manual,
    Scheduled,
    Test,
}

impl FireSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FireSource::Manual => "manual",
            FireSource::Scheduled => "scheduled",
            FireSource::Test => "test",
        }
    }
}

/// Initialize structured logging with JSON formatting and trace context
///
/// This function sets up the tracing subscriber with:
/// - JSON formatting for structured logs
/// - Log levels from `RUST_LOG` or the configured level
/// - Optional OpenTelemetry export when an OTLP endpoint is configured
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized with JSON formatting"
    );

    Ok(())
}

/// Initialize OpenTelemetry tracer with OTLP exporter
#[tracing::instrument(skip_all)]
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer(SERVICE_NAME);

    tracing::info!(
        endpoint = endpoint,
        "OpenTelemetry tracer initialized with OTLP exporter"
    );

    Ok(tracer)
}

/// Shutdown OpenTelemetry tracer provider
///
/// This should be called on graceful shutdown to flush remaining spans
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Initialize Prometheus metrics exporter on its own HTTP listener
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_metrics();

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

/// Install the Prometheus recorder and return a handle for rendering in-process
#[tracing::instrument(skip_all)]
pub fn install_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!("trigger_fires_total", "Trigger firings by source and outcome");
    describe_counter!(
        "trigger_fire_failures_total",
        "Scheduled firings that failed in the background"
    );
    describe_counter!(
        "recent_logs_cache_total",
        "Recent-logs cache lookups by result (hit or miss)"
    );
    describe_counter!(
        "cache_write_failures_total",
        "Fast cache writes that failed and were ignored"
    );
    describe_counter!("retention_archived_total", "Event logs moved to archived");
    describe_counter!("retention_purged_total", "Event logs permanently deleted");
    describe_gauge!("scheduled_timers", "Live recurring timers");
}

/// Record one firing attempt
#[inline]
pub fn record_fire(source: FireSource, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("trigger_fires_total", "source" => source.as_str(), "outcome" => outcome)
        .increment(1);
}

/// Record a background firing failure
#[inline]
pub fn record_fire_failure(trigger_id: &Uuid) {
    counter!("trigger_fire_failures_total", "trigger_id" => trigger_id.to_string()).increment(1);
}

/// Record a recent-logs cache lookup
#[inline]
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("recent_logs_cache_total", "result" => result).increment(1);
}

/// Record a swallowed cache write failure
#[inline]
pub fn record_cache_write_failure(key_kind: &'static str) {
    counter!("cache_write_failures_total", "key" => key_kind).increment(1);
}

/// Record the outcome of a retention sweep
#[inline]
pub fn record_sweep(report: &SweepReport) {
    counter!("retention_archived_total").increment(report.archived);
    counter!("retention_purged_total").increment(report.purged);
}

/// Update the live timer gauge
#[inline]
pub fn set_scheduled_timers(count: usize) {
    gauge!("scheduled_timers").set(count as f64);
}
