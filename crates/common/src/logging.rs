use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// `RUST_LOG` takes precedence; `default_level` is used when it is unset.
///
/// Spans are still bridged to OpenTelemetry, so they reach an exporter if a
/// global tracer provider is installed later on.
pub fn setup_logging(default_level: &str, environment: Environment) {
    install(tracing_opentelemetry::layer(), default_level, environment);
}

/// Install the global subscriber: env filter, then `otel_layer`, then the
/// formatter picked by `environment`.
pub(crate) fn install<L>(otel_layer: L, default_level: &str, environment: Environment)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    match environment {
        Environment::Production => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_level(true)
                        .with_current_span(true),
                )
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}
