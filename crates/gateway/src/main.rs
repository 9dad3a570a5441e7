use gateway::{
    config::get_configuration, logging::setup_logging, server::run_server, state::AppState,
};
use inference::backend::ort::{OrtDetector, YoloParams};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;
    let _telemetry = setup_logging(&config)?;

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    let params = YoloParams {
        input_size: config.input_size,
        confidence_threshold: config.confidence_threshold,
        iou_threshold: config.iou_threshold,
        ..Default::default()
    };

    tracing::info!(model_path = %config.model_path, "Loading detection model");
    let detector = OrtDetector::load_model(&config.model_path, config.execution_provider, params)?;
    tracing::info!("Model loaded successfully");

    let state = AppState::build(&config, Arc::new(detector));
    run_server(&config.bind_addr, state).await
}
