use crate::config::Config;
use common::TelemetryGuard;

/// Install the global subscriber. With an OTLP endpoint configured, spans and
/// metrics are exported too; keep the returned guard alive until shutdown.
pub fn setup_logging(config: &Config) -> anyhow::Result<Option<TelemetryGuard>> {
    match config.otel_endpoint.as_deref() {
        Some(endpoint) => Ok(Some(TelemetryGuard::init(
            "gateway",
            endpoint,
            config.log_level.as_str(),
            config.environment,
        )?)),
        None => {
            common::setup_logging(config.log_level.as_str(), config.environment);
            Ok(None)
        }
    }
}
