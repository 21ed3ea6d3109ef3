//! Tracing, trace export and metrics bootstrap shared by the service binaries.

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat, OtlpConfig};
use crate::error::StartupError;

/// Request paths that never get a trace span.
const UNTRACED_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Flushes exported spans when dropped.
#[must_use = "dropping the guard shuts trace export down"]
pub struct TelemetryGuard {
    tracer_provider: Option<TracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "trace exporter shutdown failed");
            }
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` directives win over `config.log_level`. JSON output is used
/// when `config.log_format` is [`LogFormat::Json`]. With `config.otlp` set,
/// spans are also exported over OTLP/HTTP and W3C trace context is
/// propagated.
pub fn init_tracing(config: &Config) -> Result<TelemetryGuard, StartupError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.log_format == LogFormat::Json;

    let tracer_provider = config.otlp.as_ref().map(tracer_provider).transpose()?;
    let otel = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service.name()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(otel)
        .try_init()
        .map_err(|e| StartupError::Telemetry(e.to_string()))?;

    if let (Some(provider), Some(otlp)) = (&tracer_provider, &config.otlp) {
        global::set_tracer_provider(provider.clone());
        global::set_text_map_propagator(TraceContextPropagator::new());
        tracing::info!(endpoint = %otlp.traces_endpoint(), service = %otlp.service_name, "trace export enabled");
    }

    Ok(TelemetryGuard { tracer_provider })
}

fn tracer_provider(otlp: &OtlpConfig) -> Result<TracerProvider, StartupError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp.traces_endpoint())
        .build()
        .map_err(|e| StartupError::Telemetry(e.to_string()))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new(
            "service.name",
            otlp.service_name.clone(),
        )]))
        .build())
}

/// Installs the Prometheus recorder and returns the handle `/metrics` renders.
pub fn install_metrics() -> Result<PrometheusHandle, StartupError> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Root span for everything a service does; carries `service` and `instance`.
pub fn service_span(config: &Config) -> Span {
    tracing::info_span!(
        "service",
        service = config.service.name(),
        instance = %config.instance
    )
}

/// Span for one HTTP request, named `METHOD /path` and continuing the
/// caller's trace. `/health` and `/metrics` are not traced.
pub fn request_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    if UNTRACED_PATHS.contains(&path) {
        return Span::none();
    }

    let span = tracing::info_span!(
        "http_request",
        otel.name = %format!("{} {}", request.method(), path),
        otel.kind = "server",
        method = %request.method(),
        path = %path,
    );
    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(request.headers()))
    });
    span.set_parent(parent);
    span
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}
