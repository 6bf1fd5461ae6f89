pub mod analysis;
pub mod api;
pub mod classifier;
pub mod config;
pub mod detection;
pub mod detector;
pub mod keep_alive;
pub mod ripeness;
pub mod service;
pub mod upload;

use tracing_subscriber::EnvFilter;

use crate::api::{ApiContext, ServerError};
use crate::config::{ConfigError, ServiceConfig};
use crate::detector::DetectorError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Run the analysis service until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        backend = %config.backend,
        bind_addr = %config.bind_addr,
        upload_dir = %config.upload_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "Service configuration"
    );
    tracing::info!(
        api_key = %config.roboflow.masked_api_key(),
        workspace = %config.roboflow.workspace,
        workflow = %config.roboflow.workflow_id,
        api_url = %config.roboflow.api_url,
        "Roboflow configuration"
    );

    let detector = detector::from_config(&config)?;
    let ctx = ApiContext::new(detector, &config);
    let mut server = api::start_server_on(ctx, config.bind_addr).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    server.shutdown();
    server.wait().await;
    Ok(())
}
