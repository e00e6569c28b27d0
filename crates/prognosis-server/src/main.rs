//! Prognosis server - hospital readmission risk prediction API
//!
//! Loads the trained artifact once at startup (falling back to the
//! heuristic scorer when it is unavailable) and serves predictions over HTTP.

use anyhow::{Context, Result};
use prognosis_core::{
    AppMetrics, ModelLoader, PredictionService, ServingState, StructuredLogger,
};
use prognosis_server::{api, config};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_NAME: &str = "prognosis-server";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting prognosis-server");

    let config = config::ServerConfig::load()?;
    info!(
        model_path = %config.model_path,
        allowed_origins = %config.allowed_origins,
        "Server configured"
    );

    let logger = StructuredLogger::new(SERVICE_NAME);
    let metrics = AppMetrics::new();

    // The load decision is made exactly once, before any request is served
    let loader = ModelLoader::new(config.model_config(), logger.clone());
    let load_result = tokio::task::spawn_blocking(move || loader.load())
        .await
        .context("Model loader task panicked")?;
    let state = Arc::new(ServingState::from_load_result(load_result));

    metrics.set_model_state(state.artifact());
    logger.log_startup(SERVICE_VERSION, state.mode());

    let service = PredictionService::new(state, metrics, logger.clone());
    let app_state = Arc::new(api::AppState::new(service, config.max_upload_bytes));
    let app = api::create_router(app_state, api::cors_layer(&config.allowed_origins()));

    let shutdown_logger = logger.clone();
    api::serve(&config.bind_addr(), app, async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown_logger.log_shutdown("SIGINT received"),
            Err(e) => {
                warn!(error = %e, "Could not listen for shutdown signal");
                std::future::pending::<()>().await
            }
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
