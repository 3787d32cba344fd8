use std::sync::Arc;

use anyhow::{Context, Result};
use gpc_api::{build_app, ApiMetrics, AppState};
use gpc_predict::{telemetry, AppConfig};
use gpc_services::{ModelRegistry, PredictorService, TrainingService};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    telemetry::init_tracing("gpc_predict=debug,gpc_services=debug,gpc_api=debug,tower_http=debug");

    info!("🚀 Starting geopolymer pervious concrete prediction server");

    let config = AppConfig::new()?;
    info!("✅ Configuration loaded successfully");
    info!("📊 Training data: {}", config.data.path.display());
    info!("🗂️  Model directory: {}", config.models.dir.display());

    let registry = Arc::new(ModelRegistry::new());
    let training = Arc::new(TrainingService::new(
        Arc::clone(&registry),
        config.training_config(),
        &config.models.dir,
    ));
    let predictor = Arc::new(PredictorService::new(Arc::clone(&registry)));

    // Serve even without models; predictions answer 503 until a dataset is uploaded.
    match training.load_or_train(&config.data.path, config.models.retrain_on_start).await {
        Ok(summary) => info!(
            "🧠 Models ready: loaded {:?}, trained {:?}",
            summary.loaded, summary.trained
        ),
        Err(e) => warn!("⚠️  Starting without a full model set: {:#}", e),
    }

    let metrics = ApiMetrics::new().context("registering metrics")?;
    let app = build_app(AppState::new(predictor, training, metrics));

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("🌐 Listening on http://{}", addr);
    info!("⌨️  Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
    }
}
