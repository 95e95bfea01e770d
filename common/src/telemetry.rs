// Telemetry module for structured logging, metrics, and tracing

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "triage-backend";

/// Initialize structured logging with JSON formatting and trace context.
///
/// Log levels come from `RUST_LOG` when set, otherwise from configuration.
/// When an OTLP endpoint is configured, spans are exported there as well.
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
        "Structured logging initialized"
    );

    Ok(())
}

/// Initialize the OpenTelemetry tracer with an OTLP exporter
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

    tracing::info!(endpoint = endpoint, "OpenTelemetry tracer initialized");

    Ok(tracer)
}

/// Flush remaining spans on graceful shutdown
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Register metric descriptions; call once at startup after installing the
/// recorder.
pub fn describe_metrics() {
    describe_counter!(
        "consultation_analyzed_total",
        "Total number of consultations submitted for analysis"
    );
    describe_counter!(
        "consultation_completed_total",
        "Total number of consultations completed with a recommendation"
    );
    describe_counter!(
        "consultation_failed_total",
        "Total number of consultations that ended in error"
    );
    describe_histogram!(
        "analysis_duration_seconds",
        "Wall-clock duration of symptom analysis in seconds"
    );
    describe_gauge!(
        "analyses_in_flight",
        "Number of consultations currently being analyzed"
    );
}

/// Record a consultation submitted for analysis
#[inline]
pub fn record_consultation_analyzed(source: &str) {
    counter!("consultation_analyzed_total", "source" => source.to_string()).increment(1);
}

/// Record a consultation completed with a recommendation
#[inline]
pub fn record_consultation_completed(source: &str) {
    counter!("consultation_completed_total", "source" => source.to_string()).increment(1);
}

/// Record a consultation that ended in error
#[inline]
pub fn record_consultation_failed(reason: &str) {
    counter!("consultation_failed_total", "reason" => reason.to_string()).increment(1);
}

/// Record how long an analysis took end to end
#[inline]
pub fn record_analysis_duration(duration_seconds: f64) {
    histogram!("analysis_duration_seconds").record(duration_seconds);
}

/// Update the number of analyses currently in flight
#[inline]
pub fn update_analyses_in_flight(count: i64) {
    gauge!("analyses_in_flight").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_with_valid_level() {
        // Will fail on second initialization in the same process, which is fine
        let result = init_logging("info", None);
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_metrics_recording_does_not_panic() {
        record_consultation_analyzed("engine");
        record_consultation_completed("fallback");
        record_consultation_failed("engine_unreachable");
        record_analysis_duration(1.5);
        update_analyses_in_flight(3);
    }
}
