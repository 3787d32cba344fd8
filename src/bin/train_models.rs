// Offline training: fits every model from the configured dataset and writes
// the artifacts to the model directory.
//
// Usage: train_models [DATA_PATH]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use gpc_ml::load_table;
use gpc_predict::{telemetry, AppConfig};
use gpc_services::{ModelRegistry, TrainingService};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("train_models=info,gpc_services=info,gpc_ml=info");

    let config = AppConfig::new()?;
    let data_path = std::env::args()
        .nth(1)
        .map_or_else(|| config.data.path.clone(), PathBuf::from);

    info!("📊 Loading samples from {}", data_path.display());
    let table = load_table(&data_path)
        .with_context(|| format!("loading training data from {}", data_path.display()))?;
    info!("📋 {} rows, columns: {}", table.n_rows(), table.columns().join(", "));

    let service = TrainingService::new(
        Arc::new(ModelRegistry::new()),
        config.training_config(),
        &config.models.dir,
    );
    let artifacts = service.train_all(table).await?;

    for artifact in &artifacts {
        let metrics = &artifact.metrics;
        info!(
            "✅ {:<14} {:<16} r2 {:>7.4}  rmse {:>9.4}  mae {:>9.4}  ({} train / {} test)",
            artifact.target.label(),
            artifact.kind().name(),
            metrics.r2,
            metrics.rmse,
            metrics.mae,
            metrics.n_train,
            metrics.n_test
        );
    }
    info!("💾 Models written to {}", config.models.dir.display());
    Ok(())
}
