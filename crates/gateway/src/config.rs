use common::Environment;
use inference::{ExecutionProvider, LabelFormat};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_MODEL_PATH: &str = "detect-fire.onnx";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Which request/response shape `/event/create` speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestVariant {
    /// `{"Path"}` in, `{"Results"}` out.
    #[default]
    Minimal,
    /// Event header fields accepted and echoed back under `Header`.
    Event,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub bind_addr: String,
    pub model_path: String,
    pub execution_provider: ExecutionProvider,
    /// Inference worker slots; defaults to the number of cores.
    pub workers: Option<usize>,
    /// 0 disables the timeout.
    pub inference_timeout_ms: u64,
    pub label_format: LabelFormat,
    /// Comma separated, overrides names embedded in the model.
    pub class_names: Option<String>,
    pub request_variant: RequestVariant,
    pub image_root: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub otel_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            environment: Environment::Development,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            model_path: DEFAULT_MODEL_PATH.to_string(),
            execution_provider: ExecutionProvider::Cpu,
            workers: None,
            inference_timeout_ms: DEFAULT_TIMEOUT_MS,
            label_format: LabelFormat::Index,
            class_names: None,
            request_variant: RequestVariant::Minimal,
            image_root: None,
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            otel_endpoint: None,
        }
    }
}

impl Config {
    pub fn workers(&self) -> usize {
        self.workers
            .filter(|&w| w > 0)
            .unwrap_or_else(inference::default_workers)
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        (self.inference_timeout_ms > 0).then(|| Duration::from_millis(self.inference_timeout_ms))
    }

    pub fn class_names(&self) -> Option<Vec<String>> {
        let names: Vec<String> = self
            .class_names
            .as_deref()?
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        (!names.is_empty()).then_some(names)
    }
}

/// Load configuration from `GATEWAY_*` environment variables on top of the
/// defaults, e.g. `GATEWAY_MODEL_PATH=/models/fire.onnx`.
pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("bind_addr", DEFAULT_BIND_ADDR)?
        .set_default("model_path", DEFAULT_MODEL_PATH)?
        .set_default("execution_provider", "cpu")?
        .set_default("inference_timeout_ms", DEFAULT_TIMEOUT_MS as i64)?
        .set_default("label_format", "index")?
        .set_default("request_variant", "minimal")?
        .set_default("input_size", DEFAULT_INPUT_SIZE as i64)?
        .set_default("confidence_threshold", DEFAULT_CONFIDENCE_THRESHOLD as f64)?
        .set_default("iou_threshold", DEFAULT_IOU_THRESHOLD as f64)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}
